//! Published design document shape.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

const DESIGN_ID_PREFIX: &str = "_design/";

/// One map/reduce view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce: Option<String>,
}

/// Server-side bundle of index definitions for one model type.
///
/// `id` holds the bare identifier (`post`); on the wire it is written as
/// `_id: "_design/post"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignDocument {
    #[serde(
        rename = "_id",
        serialize_with = "serialize_design_id",
        deserialize_with = "deserialize_design_id"
    )]
    pub id: String,
    #[serde(default)]
    pub views: BTreeMap<String, ViewDefinition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub spatial: BTreeMap<String, String>,
    /// Hex SHA-256 of every contributing body, in resolution order.
    #[serde(default)]
    pub signature: String,
    /// Latest mtime (epoch seconds) among contributing files.
    #[serde(default)]
    pub timestamp: i64,
}

impl DesignDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Returns whether no view or spatial index survived resolution.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty() && self.spatial.is_empty()
    }
}

fn serialize_design_id<S: Serializer>(id: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{DESIGN_ID_PREFIX}{id}"))
}

fn deserialize_design_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(raw
        .strip_prefix(DESIGN_ID_PREFIX)
        .map(str::to_string)
        .unwrap_or(raw))
}
