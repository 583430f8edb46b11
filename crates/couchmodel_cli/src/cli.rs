//! CLI argument definitions.

use clap::{Args, Parser, Subcommand};
use couchmodel_core::ViewSpec;
use std::path::PathBuf;

/// Top-level CLI parser for `couchmodel`.
#[derive(Debug, Parser)]
#[command(
    name = "couchmodel",
    version,
    about = "Mint document ids and publish design documents"
)]
pub struct Cli {
    /// Log level: trace|debug|info|warn|error.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Absolute directory for rolling log files; stderr when omitted.
    #[arg(long, global = true)]
    pub log_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print freshly generated identifiers, one per line.
    Uuid(UuidArgs),
    /// Publish a model's design document when local views changed.
    Sync(SyncArgs),
    /// Write starter files.
    #[command(subcommand)]
    Generate(GenerateCommand),
}

#[derive(Debug, Args)]
pub struct UuidArgs {
    #[arg(long, short = 'n', default_value_t = 1)]
    pub count: usize,

    /// sequential|random|utc_random
    #[arg(long, short = 'a', default_value = "sequential")]
    pub algorithm: String,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Settings file; relative paths inside it resolve against its directory.
    #[arg(long, short = 'c', default_value = "config/couchmodel.yml")]
    pub config: PathBuf,

    #[arg(long, short = 'e', default_value = "development")]
    pub env: String,

    /// Model type name, e.g. `BlogPost`.
    #[arg(long, short = 'm')]
    pub model: String,

    /// Overrides the derived design document id.
    #[arg(long)]
    pub design_document: Option<String>,

    /// View to publish, `name` or `name:spatial`; all views on disk when omitted.
    #[arg(long = "view", value_parser = parse_view_spec)]
    pub views: Vec<ViewSpec>,

    /// Sync even when `ensure_design_documents` is off for the environment.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Subcommand)]
pub enum GenerateCommand {
    /// Write `map.js` and `reduce.js` skeletons for one view.
    View {
        model: String,
        view: String,
        #[arg(long, default_value = "app/models")]
        root: PathBuf,
    },
    /// Write a settings file with one section per environment.
    Config {
        /// Base name for the per-environment buckets.
        #[arg(long, default_value = "couchmodel")]
        bucket: String,
        #[arg(long, default_value = "config/couchmodel.yml")]
        output: PathBuf,
    },
}

fn parse_view_spec(value: &str) -> Result<ViewSpec, String> {
    let (name, spatial) = match value.split_once(':') {
        Some((name, "spatial")) => (name, true),
        Some((_, suffix)) => {
            return Err(format!("unknown view suffix `{suffix}`; expected `spatial`"));
        }
        None => (value, false),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err("view name cannot be empty".to_string());
    }
    Ok(if spatial {
        ViewSpec::spatial(name)
    } else {
        ViewSpec::new(name)
    })
}
