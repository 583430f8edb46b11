//! Record values and their stored JSON form.
//!
//! # Invariants
//! - A record with `id == None` is new; it has never been created.
//! - Stored JSON documents carry `type` (the design document id) plus every
//!   declared attribute, `null` included. Plain documents are the `raw`
//!   text alone.
//! - Dirty state is measured against the last persisted values; it never
//!   affects equality.

use super::schema::{DocumentFormat, LifecycleEvent, ModelSchema, RAW_ATTRIBUTE};
use crate::store::StoreError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

const TYPE_FIELD: &str = "type";
const ID_FIELD: &str = "id";

pub type RecordResult<T> = Result<T, RecordError>;

/// Attribute name to `(old, new)` values.
pub type Changes = BTreeMap<String, (Value, Value)>;

/// Record lifecycle errors.
#[derive(Debug)]
pub enum RecordError {
    UnknownAttribute(String),
    UnknownAssociation(String),
    AssociationMismatch { expected: String, actual: String },
    /// Operation needs a persisted record.
    MissingId,
    NotFound(String),
    /// Schema validator rejected the record.
    Invalid(String),
    InvalidData(String),
    /// A lifecycle hook stopped the operation.
    Halted { event: LifecycleEvent, reason: String },
    Store(StoreError),
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownAttribute(name) => write!(f, "unknown attribute: {name}"),
            Self::UnknownAssociation(name) => write!(f, "unknown association: {name}"),
            Self::AssociationMismatch { expected, actual } => write!(
                f,
                "association expects model `{expected}`, got `{actual}`"
            ),
            Self::MissingId => write!(f, "missing id attribute"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::Invalid(reason) => write!(f, "record invalid: {reason}"),
            Self::InvalidData(message) => write!(f, "invalid stored record: {message}"),
            Self::Halted { event, reason } => write!(f, "halted by {event} hook: {reason}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RecordError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RecordError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// One instance of a model.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<ModelSchema>,
    id: Option<String>,
    attributes: BTreeMap<String, Value>,
    persisted: BTreeMap<String, Value>,
    previous_changes: Changes,
}

impl Record {
    /// Creates a new record with schema defaults applied.
    pub fn new(schema: Arc<ModelSchema>) -> Self {
        let attributes = schema
            .attributes()
            .iter()
            .map(|attr| (attr.name.clone(), attr.default.resolve()))
            .collect::<BTreeMap<_, _>>();
        Self {
            schema,
            id: None,
            persisted: attributes.clone(),
            attributes,
            previous_changes: Changes::new(),
        }
    }

    /// Creates a new record and assigns `attrs` over the defaults.
    ///
    /// An `id` entry sets the record identifier.
    pub fn with_attributes<K: Into<String>>(
        schema: Arc<ModelSchema>,
        attrs: impl IntoIterator<Item = (K, Value)>,
    ) -> RecordResult<Self> {
        let mut record = Self::new(schema);
        record.assign(attrs)?;
        Ok(record)
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Sets one declared attribute.
    pub fn set(&mut self, name: &str, value: Value) -> RecordResult<()> {
        if !self.schema.has_attribute(name) {
            return Err(RecordError::UnknownAttribute(name.to_string()));
        }
        self.attributes.insert(name.to_string(), value);
        Ok(())
    }

    /// Assigns several attributes without persisting.
    ///
    /// All names are checked before anything is written.
    pub fn assign<K: Into<String>>(
        &mut self,
        attrs: impl IntoIterator<Item = (K, Value)>,
    ) -> RecordResult<()> {
        let mut pending = Vec::new();
        let mut new_id = None;
        for (key, value) in attrs {
            let key = key.into();
            if key == ID_FIELD {
                new_id = Some(id_from_value(value)?);
                continue;
            }
            if !self.schema.has_attribute(&key) {
                return Err(RecordError::UnknownAttribute(key));
            }
            pending.push((key, value));
        }

        if let Some(id) = new_id {
            self.id = Some(id);
        }
        self.attributes.extend(pending);
        Ok(())
    }

    pub fn is_changed(&self) -> bool {
        self.attributes
            .iter()
            .any(|(name, value)| self.persisted.get(name) != Some(value))
    }

    /// Names of attributes that differ from the last persisted values.
    pub fn changed(&self) -> Vec<String> {
        self.changes().into_keys().collect()
    }

    pub fn changes(&self) -> Changes {
        self.attributes
            .iter()
            .filter_map(|(name, value)| {
                let old = self.persisted.get(name).cloned().unwrap_or(Value::Null);
                (old != *value).then(|| (name.clone(), (old, value.clone())))
            })
            .collect()
    }

    /// Changes applied by the last successful write.
    pub fn previous_changes(&self) -> &Changes {
        &self.previous_changes
    }

    /// Encodes the stored body in the schema's format.
    pub fn to_document(&self) -> RecordResult<Vec<u8>> {
        if self.schema.document_format() == DocumentFormat::Plain {
            return match self.attributes.get(RAW_ATTRIBUTE) {
                Some(Value::String(raw)) => Ok(raw.clone().into_bytes()),
                Some(Value::Null) | None => Ok(Vec::new()),
                Some(other) => Err(RecordError::InvalidData(format!(
                    "`{RAW_ATTRIBUTE}` must hold text, got {other}"
                ))),
            };
        }

        let mut body = Map::new();
        body.insert(
            TYPE_FIELD.to_string(),
            Value::String(self.schema.design_document().to_string()),
        );
        for attr in self.schema.attributes() {
            let value = self.attributes.get(&attr.name).cloned().unwrap_or(Value::Null);
            body.insert(attr.name.clone(), value);
        }
        serde_json::to_vec(&Value::Object(body))
            .map_err(|err| RecordError::InvalidData(format!("cannot encode record: {err}")))
    }

    /// Decodes a stored body; undeclared keys (including `type`) are ignored.
    pub fn from_document(schema: Arc<ModelSchema>, id: &str, bytes: &[u8]) -> RecordResult<Self> {
        let mut record = Self::new(schema);
        record.id = Some(id.to_string());

        if record.schema.document_format() == DocumentFormat::Plain {
            let raw = std::str::from_utf8(bytes).map_err(|err| {
                RecordError::InvalidData(format!("document `{id}` is not UTF-8 text: {err}"))
            })?;
            record
                .attributes
                .insert(RAW_ATTRIBUTE.to_string(), Value::String(raw.to_string()));
            record.persisted = record.attributes.clone();
            return Ok(record);
        }

        let value: Value = serde_json::from_slice(bytes).map_err(|err| {
            RecordError::InvalidData(format!("document `{id}` is not JSON: {err}"))
        })?;
        let Value::Object(fields) = value else {
            return Err(RecordError::InvalidData(format!(
                "document `{id}` is not a JSON object"
            )));
        };

        for (key, value) in fields {
            if record.schema.has_attribute(&key) {
                record.attributes.insert(key, value);
            }
        }
        record.persisted = record.attributes.clone();
        Ok(record)
    }

    /// Takes the stored copy's values as both current and persisted state.
    pub(crate) fn replace_attributes(&mut self, other: Record) {
        self.persisted = other.persisted;
        self.attributes = other.attributes;
    }

    /// Marks the current values as persisted.
    pub(crate) fn commit_changes(&mut self) {
        self.previous_changes = self.changes();
        self.persisted = self.attributes.clone();
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name()
            && self.id == other.id
            && self.attributes == other.attributes
    }
}

fn id_from_value(value: Value) -> RecordResult<String> {
    match value {
        Value::String(id) if !id.trim().is_empty() => Ok(id),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(RecordError::InvalidData(format!(
            "id must be a non-empty string, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{Record, RecordError};
    use crate::model::{DocumentFormat, ModelSchema};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn post_schema() -> Arc<ModelSchema> {
        Arc::new(
            ModelSchema::new("Post")
                .attribute("title")
                .attribute("body")
                .attribute_default("author", json!("Anonymous"))
                .attribute_provider("tags", || json!([])),
        )
    }

    #[test]
    fn new_record_applies_defaults() {
        let record = Record::new(post_schema());
        assert!(record.is_new());
        assert_eq!(record.get("author"), Some(&json!("Anonymous")));
        assert_eq!(record.get("tags"), Some(&json!([])));
        assert_eq!(record.get("title"), Some(&Value::Null));
    }

    #[test]
    fn assign_sets_id_and_rejects_unknown_names_atomically() {
        let mut record = Record::with_attributes(
            post_schema(),
            [("id", json!("hello-world")), ("title", json!("Hello"))],
        )
        .expect("declared attributes should assign");
        assert_eq!(record.id(), Some("hello-world"));

        let err = record
            .assign([("title", json!("Changed")), ("bogus", json!(1))])
            .expect_err("unknown attribute should fail");
        assert!(matches!(err, RecordError::UnknownAttribute(name) if name == "bogus"));
        assert_eq!(record.get("title"), Some(&json!("Hello")));
    }

    #[test]
    fn stored_document_carries_type_and_every_attribute() {
        let record =
            Record::with_attributes(post_schema(), [("title", json!("Hi"))]).expect("assign");
        let body: Value =
            serde_json::from_slice(&record.to_document().expect("encode")).expect("json");
        assert_eq!(body["type"], "post");
        assert_eq!(body["title"], "Hi");
        assert!(body["body"].is_null());

        let loaded = Record::from_document(post_schema(), "p1", &record.to_document().unwrap())
            .expect("decode");
        assert_eq!(loaded.id(), Some("p1"));
        assert_eq!(loaded.get("title"), Some(&json!("Hi")));
    }

    #[test]
    fn changes_track_values_against_persisted_state() {
        let mut record =
            Record::with_attributes(post_schema(), [("title", json!("Hi"))]).expect("assign");
        assert_eq!(record.changed(), vec!["title"]);

        record.commit_changes();
        assert!(!record.is_changed());
        assert_eq!(
            record.previous_changes().get("title"),
            Some(&(Value::Null, json!("Hi")))
        );

        record.set("author", json!("Anonymous")).expect("same value");
        assert!(!record.is_changed());
        record.set("body", json!("Text")).expect("set");
        record.set("title", json!("Hello")).expect("set");
        assert_eq!(record.changed(), vec!["body", "title"]);
        assert_eq!(
            record.changes().get("title"),
            Some(&(json!("Hi"), json!("Hello")))
        );

        let loaded = Record::from_document(post_schema(), "p1", &record.to_document().unwrap())
            .expect("decode");
        assert!(!loaded.is_changed());
        let mut expected = record.clone();
        expected.set_id(Some("p1".to_string()));
        assert_eq!(loaded, expected);
    }

    #[test]
    fn plain_documents_hold_raw_text_only() {
        let schema = Arc::new(ModelSchema::new("Attachment").format(DocumentFormat::Plain));
        let text = "line one\n{not json";
        let record = Record::with_attributes(Arc::clone(&schema), [("raw", json!(text))])
            .expect("assign");
        assert_eq!(record.to_document().expect("encode"), text.as_bytes());

        let loaded =
            Record::from_document(Arc::clone(&schema), "a1", text.as_bytes()).expect("decode");
        assert_eq!(loaded.get("raw"), Some(&json!(text)));

        let err = Record::from_document(Arc::clone(&schema), "a2", &[0xff, 0xfe])
            .expect_err("binary body");
        assert!(matches!(err, RecordError::InvalidData(_)));

        let mut numeric = Record::new(schema);
        assert!(numeric.to_document().expect("null raw").is_empty());
        numeric.set("raw", json!(42)).expect("declared");
        assert!(matches!(
            numeric.to_document(),
            Err(RecordError::InvalidData(_))
        ));
    }
}
