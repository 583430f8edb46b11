//! Model schema registration.

use super::record::Record;
use crate::design::{design_document_id, ViewSpec};
use serde_json::Value;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Attribute holding the whole body of a plain-format record.
pub const RAW_ATTRIBUTE: &str = "raw";

/// Record validation hook; `Err` carries a human-readable reason.
pub type Validator = Arc<dyn Fn(&Record) -> Result<(), String> + Send + Sync>;

/// Lifecycle hook; `Err` halts the operation with the given reason.
pub type Hook = Arc<dyn Fn(&mut Record) -> Result<(), String> + Send + Sync>;

/// Stored body encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DocumentFormat {
    /// JSON object with `type` plus every declared attribute.
    #[default]
    Json,
    /// The `raw` attribute as UTF-8 text, nothing else.
    Plain,
}

/// Points in the record lifecycle where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    BeforeSave,
    AfterSave,
    BeforeCreate,
    AfterCreate,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
}

impl LifecycleEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeSave => "before_save",
            Self::AfterSave => "after_save",
            Self::BeforeCreate => "before_create",
            Self::AfterCreate => "after_create",
            Self::BeforeUpdate => "before_update",
            Self::AfterUpdate => "after_update",
            Self::BeforeDelete => "before_delete",
            Self::AfterDelete => "after_delete",
        }
    }
}

impl Display for LifecycleEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default value source for an attribute.
#[derive(Clone, Default)]
pub enum AttributeDefault {
    /// Attribute starts as `null`.
    #[default]
    None,
    Value(Value),
    /// Evaluated once per new record.
    Provider(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl AttributeDefault {
    pub fn resolve(&self) -> Value {
        match self {
            Self::None => Value::Null,
            Self::Value(value) => value.clone(),
            Self::Provider(provider) => provider(),
        }
    }
}

impl Debug for AttributeDefault {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttributeDef {
    pub name: String,
    pub default: AttributeDefault,
}

/// `belongs_to` association stored as `<name>_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub name: String,
    /// Model name of the referenced type.
    pub target: String,
    pub foreign_key: String,
}

/// Declared shape of one model type.
#[derive(Clone)]
pub struct ModelSchema {
    name: String,
    design_document: String,
    attributes: Vec<AttributeDef>,
    associations: Vec<Association>,
    views: Vec<ViewSpec>,
    format: DocumentFormat,
    validator: Option<Validator>,
    hooks: Vec<(LifecycleEvent, Hook)>,
}

impl ModelSchema {
    /// Starts a schema; the design document id is derived from `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            design_document: design_document_id(&name),
            name,
            attributes: Vec::new(),
            associations: Vec::new(),
            views: Vec::new(),
            format: DocumentFormat::Json,
            validator: None,
            hooks: Vec::new(),
        }
    }

    /// Declares an attribute defaulting to `null`.
    pub fn attribute(self, name: impl Into<String>) -> Self {
        self.attribute_with(name, AttributeDefault::None)
    }

    /// Declares an attribute with a default.
    ///
    /// Re-declaring an existing name replaces its default in place.
    pub fn attribute_with(mut self, name: impl Into<String>, default: AttributeDefault) -> Self {
        let name = name.into();
        match self.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(existing) => existing.default = default,
            None => self.attributes.push(AttributeDef { name, default }),
        }
        self
    }

    pub fn attribute_default(self, name: impl Into<String>, value: Value) -> Self {
        self.attribute_with(name, AttributeDefault::Value(value))
    }

    pub fn attribute_provider(
        self,
        name: impl Into<String>,
        provider: impl Fn() -> Value + Send + Sync + 'static,
    ) -> Self {
        self.attribute_with(name, AttributeDefault::Provider(Arc::new(provider)))
    }

    /// Declares a `belongs_to` association and its `<name>_id` attribute.
    pub fn belongs_to(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        let name = name.into();
        let foreign_key = format!("{name}_id");
        self = self.attribute(foreign_key.clone());
        self.associations.push(Association {
            name,
            target: target.into(),
            foreign_key,
        });
        self
    }

    /// Declares a view synchronized into the design document.
    pub fn view(mut self, view: ViewSpec) -> Self {
        if !self.views.iter().any(|existing| existing.name == view.name) {
            self.views.push(view);
        }
        self
    }

    /// Overrides the derived design document id.
    pub fn design_document_name(mut self, name: impl Into<String>) -> Self {
        self.design_document = name.into();
        self
    }

    /// Sets the stored body encoding; `Plain` declares [`RAW_ATTRIBUTE`].
    pub fn format(mut self, format: DocumentFormat) -> Self {
        self.format = format;
        if format == DocumentFormat::Plain && !self.has_attribute(RAW_ATTRIBUTE) {
            self = self.attribute(RAW_ATTRIBUTE);
        }
        self
    }

    /// Registers a lifecycle hook; hooks for one event run in registration
    /// order.
    pub fn on(
        mut self,
        event: LifecycleEvent,
        hook: impl Fn(&mut Record) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.push((event, Arc::new(hook)));
        self
    }

    pub fn validator(
        mut self,
        validator: impl Fn(&Record) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn design_document(&self) -> &str {
        &self.design_document
    }

    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attr| attr.name == name)
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|assoc| assoc.name == name)
    }

    pub fn views(&self) -> &[ViewSpec] {
        &self.views
    }

    pub fn document_format(&self) -> DocumentFormat {
        self.format
    }

    pub(crate) fn hooks(&self, event: LifecycleEvent) -> impl Iterator<Item = &Hook> {
        self.hooks
            .iter()
            .filter(move |(registered, _)| *registered == event)
            .map(|(_, hook)| hook)
    }

    pub(crate) fn run_validator(&self, record: &Record) -> Result<(), String> {
        match &self.validator {
            Some(validator) => validator(record),
            None => Ok(()),
        }
    }
}

impl Debug for ModelSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSchema")
            .field("name", &self.name)
            .field("design_document", &self.design_document)
            .field("attributes", &self.attributes)
            .field("associations", &self.associations)
            .field("views", &self.views)
            .field("format", &self.format)
            .field("validator", &self.validator.is_some())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentFormat, LifecycleEvent, ModelSchema, RAW_ATTRIBUTE};
    use crate::design::ViewSpec;
    use serde_json::json;

    #[test]
    fn derives_design_document_and_allows_override() {
        assert_eq!(ModelSchema::new("BlogPost").design_document(), "blog_post");
        let user = ModelSchema::new("User").design_document_name("people");
        assert_eq!(user.design_document(), "people");
    }

    #[test]
    fn redeclared_attribute_replaces_default() {
        let schema = ModelSchema::new("Post")
            .attribute("author")
            .attribute_default("author", json!("Anonymous"));
        assert_eq!(schema.attributes().len(), 1);
        assert_eq!(schema.attributes()[0].default.resolve(), json!("Anonymous"));
    }

    #[test]
    fn belongs_to_registers_foreign_key_attribute() {
        let schema = ModelSchema::new("Wine").belongs_to("winery", "Brewery");
        assert!(schema.has_attribute("winery_id"));
        let assoc = schema.association("winery").expect("association");
        assert_eq!(assoc.target, "Brewery");
    }

    #[test]
    fn duplicate_views_are_declared_once() {
        let schema = ModelSchema::new("Post")
            .view(ViewSpec::new("by_title"))
            .view(ViewSpec::new("by_title"));
        assert_eq!(schema.views().len(), 1);
    }

    #[test]
    fn plain_format_declares_raw_attribute_once() {
        let schema = ModelSchema::new("Attachment")
            .format(DocumentFormat::Plain)
            .format(DocumentFormat::Plain);
        assert_eq!(schema.document_format(), DocumentFormat::Plain);
        assert_eq!(schema.attributes().len(), 1);
        assert!(schema.has_attribute(RAW_ATTRIBUTE));
        assert_eq!(ModelSchema::new("Post").document_format(), DocumentFormat::Json);
    }

    #[test]
    fn hooks_are_selected_by_event_in_registration_order() {
        let schema = ModelSchema::new("Post")
            .attribute("title")
            .on(LifecycleEvent::BeforeSave, |_| Err("first".to_string()))
            .on(LifecycleEvent::AfterSave, |_| Err("after".to_string()))
            .on(LifecycleEvent::BeforeSave, |_| Err("second".to_string()));
        let mut record = crate::model::Record::new(std::sync::Arc::new(schema.clone()));
        let reasons: Vec<String> = schema
            .hooks(LifecycleEvent::BeforeSave)
            .map(|hook| hook(&mut record).expect_err("hook fails"))
            .collect();
        assert_eq!(reasons, vec!["first", "second"]);
        assert_eq!(schema.hooks(LifecycleEvent::AfterDelete).count(), 0);
        assert_eq!(LifecycleEvent::BeforeSave.to_string(), "before_save");
    }
}
