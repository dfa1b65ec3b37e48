//! dgkit - keeps a data catalog in step with versioned data models.

mod bundle;
mod commands;
mod config;
mod formatter;
mod store;

use clap::Parser;
use config::{Cli, Command};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "dgkit=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let command = cli.command;
    let config = cli.args.into_config();

    info!(
        store = %config.store_path.display(),
        catalog = %config.catalog.catalog_name,
        snapshot = config.use_snapshot,
        "Starting dgkit"
    );

    let outcome = match &command {
        Command::Pull => commands::pull(&config)?,
        Command::Sync { bundle } => commands::sync(&config, bundle)?,
        Command::Check {
            bundle,
            core_layer,
            raw_layer,
            tech_columns,
        } => commands::check(&config, bundle, core_layer, raw_layer, tech_columns)?,
    };

    println!("{}", outcome.output);
    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
