//! CLI argument definitions for tickwatch.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `watch` | Run the refresh engine until interrupted |
//! | `snapshot` | Resolve one symbol on demand and print its snapshot |
//! | `sectors` | Run one refresh cycle and print the sector ranking |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--registry` | (built-in list) | Path to a JSON tracked-instrument file |
//! | `--mock` | `false` | Serve deterministic data, no network I/O |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! # Run the engine against the built-in universe
//! tickwatch watch
//!
//! # Track a custom universe, refreshing every 5 minutes
//! tickwatch watch --registry tickers.json --interval-mins 5
//!
//! # One-shot snapshot for a symbol outside the tracked universe
//! tickwatch snapshot NVDA --pretty
//! ```

use clap::{Args, Parser, Subcommand};

/// Tickwatch - background market refresh engine
///
/// Keeps an in-memory view of a tracked instrument universe: prices,
/// indicators, recommendations and sector-relative performance, refreshed on
/// a fixed cadence by a background cycle.
#[derive(Debug, Parser)]
#[command(
    name = "tickwatch",
    author,
    version,
    about = "Background market refresh engine"
)]
pub struct Cli {
    /// Path to a JSON registry file of {symbol, name, sector} entries.
    /// Falls back to a built-in universe when absent or unreadable.
    #[arg(long, global = true)]
    pub registry: Option<String>,

    /// Use mock providers with deterministic data (no network I/O).
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Pretty-print JSON output.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the refresh engine until interrupted.
    Watch(WatchArgs),
    /// Resolve one symbol on demand and print its snapshot.
    Snapshot(SnapshotArgs),
    /// Run one refresh cycle and print the sector ranking and heatmap.
    Sectors(SectorsArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Minutes between refresh cycles.
    #[arg(long, default_value_t = 20)]
    pub interval_mins: u64,

    /// Concurrent fetch workers per cycle.
    #[arg(long, default_value_t = 5)]
    pub workers: usize,
}

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Symbol to resolve (e.g. MC.PA, AAPL).
    pub symbol: String,
}

#[derive(Debug, Args)]
pub struct SectorsArgs {
    /// Also print the per-instrument heatmap.
    #[arg(long, default_value_t = false)]
    pub heatmap: bool,
}
