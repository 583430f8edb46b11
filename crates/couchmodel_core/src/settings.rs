//! Environment-keyed YAML configuration.
//!
//! # Responsibility
//! - Load one environment section from a YAML settings file.
//! - Render the starter file written by `couchmodel generate config`.
//!
//! # Invariants
//! - YAML merge keys (`<<: *common`) are applied before the section is read.
//! - Unknown algorithm names are rejected, never defaulted.

use crate::uuid::UuidAlgorithm;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(Debug)]
pub enum SettingsError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_yaml::Error),
    MissingEnvironment(String),
    InvalidValue { field: &'static str, message: String },
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read settings `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse settings: {err}"),
            Self::MissingEnvironment(env) => {
                write!(f, "settings have no section for environment `{env}`")
            }
            Self::InvalidValue { field, message } => {
                write!(f, "invalid settings value for `{field}`: {message}")
            }
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::MissingEnvironment(_) | Self::InvalidValue { .. } => None,
        }
    }
}

impl From<serde_yaml::Error> for SettingsError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Parse(value)
    }
}

/// Settings for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bucket: String,
    /// SQLite file backing the local store; in-memory when unset.
    pub database: Option<PathBuf>,
    /// Design document search roots, in precedence order.
    pub design_documents_paths: Vec<PathBuf>,
    pub ensure_design_documents: bool,
    pub uuid_algorithm: UuidAlgorithm,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bucket: "default".to_string(),
            database: None,
            design_documents_paths: Vec::new(),
            ensure_design_documents: true,
            uuid_algorithm: UuidAlgorithm::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    bucket: Option<String>,
    database: Option<PathBuf>,
    #[serde(default)]
    design_documents_paths: Vec<PathBuf>,
    ensure_design_documents: Option<bool>,
    uuid_algorithm: Option<String>,
}

impl Settings {
    /// Reads the `env` section from the YAML file at `path`.
    pub fn load(path: impl AsRef<Path>, env: &str) -> SettingsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, env)
    }

    /// Parses the `env` section from YAML text.
    pub fn from_yaml_str(text: &str, env: &str) -> SettingsResult<Self> {
        let mut document: serde_yaml::Value = serde_yaml::from_str(text)?;
        document.apply_merge()?;

        let section = document
            .get(env)
            .cloned()
            .ok_or_else(|| SettingsError::MissingEnvironment(env.to_string()))?;
        let raw: RawSettings = serde_yaml::from_value(section)?;

        let defaults = Self::default();
        let uuid_algorithm = match raw.uuid_algorithm {
            Some(name) => name
                .parse::<UuidAlgorithm>()
                .map_err(|err| SettingsError::InvalidValue {
                    field: "uuid_algorithm",
                    message: err.to_string(),
                })?,
            None => defaults.uuid_algorithm,
        };
        let bucket = match raw.bucket {
            Some(bucket) if bucket.trim().is_empty() => {
                return Err(SettingsError::InvalidValue {
                    field: "bucket",
                    message: "bucket cannot be empty".to_string(),
                });
            }
            Some(bucket) => bucket,
            None => defaults.bucket,
        };

        Ok(Self {
            bucket,
            database: raw.database,
            design_documents_paths: raw.design_documents_paths,
            ensure_design_documents: raw
                .ensure_design_documents
                .unwrap_or(defaults.ensure_design_documents),
            uuid_algorithm,
        })
    }
}

/// Starter settings file with `development`, `test` and `production`
/// sections sharing a `common` block.
pub fn settings_template(app_name: &str) -> String {
    format!(
        "common: &common\n  \
           design_documents_paths:\n    - app/models\n  \
           ensure_design_documents: true\n  \
           uuid_algorithm: sequential\n\
         \n\
         development:\n  <<: *common\n  bucket: {app_name}_development\n  database: db/{app_name}_development.sqlite3\n\
         \n\
         test:\n  <<: *common\n  bucket: {app_name}_test\n\
         \n\
         production:\n  <<: *common\n  bucket: {app_name}_production\n  database: db/{app_name}_production.sqlite3\n"
    )
}
