use std::sync::Arc;

use tickwatch_core::{SourceRouter, Symbol};
use tickwatch_engine::{EngineConfig, Resolver, SnapshotStore};

use crate::cli::{Cli, SnapshotArgs};
use crate::commands::print_json;
use crate::error::CliError;

pub async fn run(args: &SnapshotArgs, cli: &Cli, router: Arc<SourceRouter>) -> Result<(), CliError> {
    let symbol = Symbol::parse(&args.symbol)?;

    let resolver = Resolver::new(router, SnapshotStore::new(), EngineConfig::default());
    let snapshot = resolver.resolve(&symbol).await?;

    print_json(&snapshot, cli.pretty)
}
