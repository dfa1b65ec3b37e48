//! Command-line arguments and CLI configuration.

use crate::formatter::OutputFormat;
use clap::{Parser, Subcommand};
use dgkit_core::config::{DEFAULT_CATALOG_NAME, DEFAULT_CHECKPOINT_PATH, DEFAULT_DOMAIN};
use dgkit_core::{CatalogConfig, SyncOptions};
use std::path::PathBuf;

/// Default path of the flat-file catalog store.
pub const DEFAULT_STORE_PATH: &str = "./.dgkit/catalog_store.json";

/// Default physical layer holding curated tables.
pub const DEFAULT_CORE_LAYER: &str = "core";

/// Default physical layer holding raw copies of landed data.
pub const DEFAULT_RAW_LAYER: &str = "raw";

#[derive(Parser, Debug)]
#[command(name = "dgkit")]
#[command(
    version,
    about = "Data catalog sync for logical, physical and business models",
    long_about = None
)]
pub struct Cli {
    #[command(flatten)]
    pub args: Args,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pull the catalog from the store and refresh the local snapshot.
    Pull,

    /// Reconcile the catalog with the logical model of a bundle.
    Sync {
        /// Model bundle (JSON).
        #[arg(short, long)]
        bundle: PathBuf,
    },

    /// Validate a bundle against the built-in conventions.
    Check {
        /// Model bundle (JSON).
        #[arg(short, long)]
        bundle: PathBuf,

        /// Layer holding curated tables.
        #[arg(long, env = "DGKIT_CORE_LAYER", default_value = DEFAULT_CORE_LAYER)]
        core_layer: String,

        /// Layer holding raw copies of landed data.
        #[arg(long, env = "DGKIT_RAW_LAYER", default_value = DEFAULT_RAW_LAYER)]
        raw_layer: String,

        /// Core column names that need no logical counterpart.
        #[arg(long = "tech-column", env = "DGKIT_TECH_COLUMNS", value_delimiter = ',')]
        tech_columns: Vec<String>,
    },
}

/// Flags shared by every command.
#[derive(clap::Args, Debug, Clone)]
pub struct Args {
    /// Path of the flat-file catalog store.
    #[arg(long, global = true, env = "DGKIT_STORE", default_value = DEFAULT_STORE_PATH)]
    pub store: PathBuf,

    /// Directory holding catalog snapshots.
    #[arg(
        long,
        global = true,
        env = "DGKIT_CHECKPOINT_PATH",
        default_value = DEFAULT_CHECKPOINT_PATH
    )]
    pub checkpoint_path: PathBuf,

    /// Catalog name, used as the snapshot file stem.
    #[arg(long, global = true, env = "DGKIT_CATALOG_NAME", default_value = DEFAULT_CATALOG_NAME)]
    pub catalog_name: String,

    /// Domain written to rows of units without one.
    #[arg(long, global = true, env = "DGKIT_DEFAULT_DOMAIN", default_value = DEFAULT_DOMAIN)]
    pub default_domain: String,

    /// Always pull from the store and never write a snapshot.
    #[arg(long, global = true, env = "DGKIT_NO_SNAPSHOT")]
    pub no_snapshot: bool,

    /// Skip row and page updates whose content is already in the catalog.
    #[arg(long, global = true, env = "DGKIT_SKIP_UNCHANGED")]
    pub skip_unchanged: bool,

    /// Print the sync plan without writing to the store.
    #[arg(long, global = true, env = "DGKIT_DRY_RUN")]
    pub dry_run: bool,

    /// Output format.
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Resolved settings for one CLI invocation.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub catalog: CatalogConfig,
    pub store_path: PathBuf,
    pub use_snapshot: bool,
    pub sync: SyncOptions,
    pub format: OutputFormat,
}

impl Args {
    /// Convert command-line arguments to CLI configuration.
    pub fn into_config(self) -> CliConfig {
        let catalog = CatalogConfig::new(self.checkpoint_path)
            .with_catalog_name(self.catalog_name)
            .with_default_domain(self.default_domain);
        let sync = SyncOptions::from_config(&catalog)
            .with_skip_unchanged(self.skip_unchanged)
            .with_dry_run(self.dry_run);

        CliConfig {
            catalog,
            store_path: self.store,
            use_snapshot: !self.no_snapshot,
            sync,
            format: self.format,
        }
    }
}
