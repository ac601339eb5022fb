mod sectors;
mod snapshot;
mod watch;

use std::sync::Arc;

use tickwatch_core::{
    fallback_universe, FileRegistry, InstrumentRegistry, SourceRouter, SourceRouterBuilder,
    StaticRegistry,
};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let router = Arc::new(build_router(cli));
    let registry = build_registry(cli);

    match &cli.command {
        Command::Watch(args) => watch::run(args, router, registry).await,
        Command::Snapshot(args) => snapshot::run(args, cli, router).await,
        Command::Sectors(args) => sectors::run(args, cli, router, registry).await,
    }
}

fn build_router(cli: &Cli) -> SourceRouter {
    if cli.mock {
        SourceRouterBuilder::new().with_mock_mode().build()
    } else {
        SourceRouterBuilder::new().with_real_clients().build()
    }
}

fn build_registry(cli: &Cli) -> Arc<dyn InstrumentRegistry> {
    match &cli.registry {
        Some(path) => Arc::new(FileRegistry::new(path)),
        None => Arc::new(StaticRegistry::new(fallback_universe())),
    }
}

pub fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}
