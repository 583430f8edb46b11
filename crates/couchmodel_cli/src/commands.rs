//! Command handlers.
//!
//! # Invariants
//! - Generated files never overwrite existing ones.
//! - `sync` logs and returns store errors; it does not retry.

use crate::cli::{Cli, Command, GenerateCommand, SyncArgs, UuidArgs};
use couchmodel_core::settings::{settings_template, SettingsError};
use couchmodel_core::{
    design_document_id, init_logging, DesignDocumentSynchronizer, DocumentStore, MemoryStore,
    ModelConfig, ModelSchema, Settings, SqliteStore, StoreError, SyncError, UuidError,
    UuidGenerator,
};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MAP_TEMPLATE: &str = include_str!("templates/map.js");
const REDUCE_TEMPLATE: &str = include_str!("templates/reduce.js");

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub enum CliError {
    Logging(String),
    Uuid(UuidError),
    Settings(SettingsError),
    Store(StoreError),
    Sync(SyncError),
    Io { path: PathBuf, source: io::Error },
    AlreadyExists(PathBuf),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(message) => write!(f, "logging: {message}"),
            Self::Uuid(err) => write!(f, "{err}"),
            Self::Settings(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Sync(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "`{}`: {source}", path.display()),
            Self::AlreadyExists(path) => {
                write!(f, "`{}` already exists; not overwriting", path.display())
            }
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Uuid(err) => Some(err),
            Self::Settings(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Sync(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Logging(_) | Self::AlreadyExists(_) => None,
        }
    }
}

impl From<UuidError> for CliError {
    fn from(value: UuidError) -> Self {
        Self::Uuid(value)
    }
}

impl From<SettingsError> for CliError {
    fn from(value: SettingsError) -> Self {
        Self::Settings(value)
    }
}

impl From<StoreError> for CliError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<SyncError> for CliError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

/// Initializes logging and runs the parsed command.
pub fn dispatch(cli: Cli) -> CliResult<()> {
    init_logging(&cli.log_level, cli.log_dir.as_deref()).map_err(CliError::Logging)?;
    match cli.command {
        Command::Uuid(args) => run_uuid(&args),
        Command::Sync(args) => run_sync(&args),
        Command::Generate(GenerateCommand::View { model, view, root }) => {
            generate_view(&model, &view, &root)
        }
        Command::Generate(GenerateCommand::Config { bucket, output }) => {
            generate_config(&bucket, &output)
        }
    }
}

fn run_uuid(args: &UuidArgs) -> CliResult<()> {
    let ids = UuidGenerator::global()
        .next_named(args.count, &args.algorithm)?
        .into_vec();
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

fn run_sync(args: &SyncArgs) -> CliResult<()> {
    let settings = Settings::load(&args.config, &args.env)?;
    if !settings.ensure_design_documents && !args.force {
        println!(
            "design document sync disabled for `{}`; pass --force to run anyway",
            args.env
        );
        return Ok(());
    }

    let base = args.config.parent().unwrap_or_else(|| Path::new(""));
    let store = open_store(&settings, base)?;
    let mut schema = ModelSchema::new(args.model.as_str());
    if let Some(name) = &args.design_document {
        schema = schema.design_document_name(name.as_str());
    }
    for view in &args.views {
        schema = schema.view(view.clone());
    }
    let model = ModelConfig::new(schema, store).with_uuid_algorithm(settings.uuid_algorithm);

    let roots = settings
        .design_documents_paths
        .iter()
        .map(|path| base.join(path))
        .collect();
    let synchronizer = DesignDocumentSynchronizer::new(roots);
    let outcome = synchronizer.ensure(&model).map_err(|err| {
        warn!(
            "event=cli_sync module=cli status=error doc={} error={}",
            model.design_document(),
            err
        );
        err
    })?;

    info!(
        "event=cli_sync module=cli status=ok doc={} outcome={}",
        model.design_document(),
        outcome
    );
    println!("{}: {outcome}", model.design_document());
    Ok(())
}

fn open_store(settings: &Settings, base: &Path) -> CliResult<Arc<dyn DocumentStore>> {
    let Some(database) = &settings.database else {
        info!("event=cli_store module=cli status=ok backend=memory");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let path = base.join(database);
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    Ok(Arc::new(SqliteStore::open(&path)?))
}

fn generate_view(model: &str, view: &str, root: &Path) -> CliResult<()> {
    let dir = root.join(design_document_id(model)).join(view);
    create_dir(&dir)?;
    write_new(&dir.join("map.js"), MAP_TEMPLATE)?;
    write_new(&dir.join("reduce.js"), REDUCE_TEMPLATE)?;
    Ok(())
}

fn generate_config(bucket: &str, output: &Path) -> CliResult<()> {
    if let Some(parent) = output.parent() {
        create_dir(parent)?;
    }
    write_new(output, &settings_template(bucket))
}

fn create_dir(dir: &Path) -> CliResult<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|source| CliError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_new(path: &Path, contents: &str) -> CliResult<()> {
    let io_error = |source: io::Error| CliError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(CliError::AlreadyExists(path.to_path_buf()));
        }
        Err(err) => return Err(io_error(err)),
    };
    file.write_all(contents.as_bytes()).map_err(io_error)?;
    println!("create {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{write_new, CliError};

    #[test]
    fn write_new_keeps_existing_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("map.js");
        std::fs::write(&path, "function(mine) {}").expect("seed file");

        let err = write_new(&path, "function(template) {}").expect_err("existing file");
        assert!(matches!(err, CliError::AlreadyExists(found) if found == path));
        assert_eq!(
            std::fs::read_to_string(&path).expect("read back"),
            "function(mine) {}"
        );
    }

    #[test]
    fn write_new_reports_missing_parent_as_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("map.js");
        let err = write_new(&path, "x").expect_err("no parent directory");
        assert!(matches!(err, CliError::Io { .. }));
    }
}
