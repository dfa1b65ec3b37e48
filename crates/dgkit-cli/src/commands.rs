//! Command implementations.

use crate::bundle::{LoadedModels, ModelBundle};
use crate::config::CliConfig;
use crate::formatter::create_formatter;
use crate::store::FileCatalogEngine;
use anyhow::{Context, Result};
use dgkit_core::check::has_errors;
use dgkit_core::{
    Convention, CrossReference, DataCatalog, LocalSnapshot, ModelView, SnapshotStore, SyncEngine,
};
use std::path::Path;
use tracing::{debug, info, warn};

/// Rendered output of a command and whether it succeeded.
#[derive(Debug)]
pub struct CommandOutcome {
    pub output: String,
    pub success: bool,
}

fn snapshot_store(config: &CliConfig) -> Option<Box<dyn SnapshotStore>> {
    config
        .use_snapshot
        .then(|| Box::new(LocalSnapshot::from_config(&config.catalog)) as Box<dyn SnapshotStore>)
}

fn open_engine(config: &CliConfig) -> Result<FileCatalogEngine> {
    FileCatalogEngine::open(&config.store_path).with_context(|| {
        format!(
            "failed to open catalog store {}",
            config.store_path.display()
        )
    })
}

/// Cross-reference the loaded models, logging what does not resolve.
fn index_models(models: &LoadedModels) -> CrossReference {
    let xref = CrossReference::build(&models.lm, &models.pm, &models.bi);
    let dangling = xref.dangling_pm_mappings().len();
    let unregistered = xref.unregistered_bi_ids().len();
    if dangling > 0 || unregistered > 0 {
        warn!(
            dangling_pm_mappings = dangling,
            unregistered_bi_ids = unregistered,
            "Model bundle has unresolved links; run check for details"
        );
    }
    info!(
        version = %models.lm.version(),
        lm_units = models.lm.len(),
        pm_links = xref.lm_objects_by_pm_id().len(),
        bi_links = xref.lm_objects_by_bi_id().len(),
        "Indexed model bundle"
    );
    xref
}

/// Pull the whole catalog and rewrite the snapshot.
pub fn pull(config: &CliConfig) -> Result<CommandOutcome> {
    let engine = open_engine(config)?;
    debug!(
        records = engine.record_count(),
        archived = engine.archived_count(),
        "Pulling catalog"
    );
    let catalog = DataCatalog::pull(engine, snapshot_store(config))
        .context("failed to pull catalog")?;

    let formatter = create_formatter(config.format);
    Ok(CommandOutcome {
        output: formatter.format_pull(catalog.catalog(), catalog.has_snapshot_store()),
        success: true,
    })
}

/// Sync the catalog with the logical model of `bundle`.
pub fn sync(config: &CliConfig, bundle: &Path) -> Result<CommandOutcome> {
    let models = ModelBundle::from_path(bundle)?
        .load()
        .with_context(|| format!("failed to load bundle {}", bundle.display()))?;
    index_models(&models);

    let mut catalog = DataCatalog::open(open_engine(config)?, snapshot_store(config))
        .context("failed to open catalog")?;
    let report = SyncEngine::new(&models.lm, config.sync.clone()).run(&mut catalog);

    let formatter = create_formatter(config.format);
    let output = match &report.planned {
        Some(plan) => formatter.format_plan(plan),
        None => formatter.format_report(&report),
    };
    Ok(CommandOutcome {
        output,
        success: report.is_success(),
    })
}

/// Validate `bundle` against the built-in conventions.
pub fn check(
    config: &CliConfig,
    bundle: &Path,
    core_layer: &str,
    raw_layer: &str,
    tech_columns: &[String],
) -> Result<CommandOutcome> {
    let models = ModelBundle::from_path(bundle)?
        .load()
        .with_context(|| format!("failed to load bundle {}", bundle.display()))?;

    let view = ModelView::new(&models.lm, &models.pm, &models.bi);
    let findings = Convention::builtin_with_tech_columns(core_layer, raw_layer, tech_columns)
        .validate(&view);
    info!(findings = findings.len(), "Checked model bundle");

    let formatter = create_formatter(config.format);
    Ok(CommandOutcome {
        output: formatter.format_findings(&findings),
        success: !has_errors(&findings),
    })
}
