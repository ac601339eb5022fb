use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::{Instrument, Symbol};

/// Errors raised while reading the tracked-instrument list.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse registry file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("registry entry '{symbol}' is invalid: {reason}")]
    InvalidEntry { symbol: String, reason: String },

    #[error("registry lists no instruments")]
    Empty,
}

/// Read-only source of the tracked instrument universe.
///
/// The list is external input: the engine reads it once per refresh cycle and
/// never writes it. Implementations must tolerate being called repeatedly.
pub trait InstrumentRegistry: Send + Sync {
    fn list_tracked(&self) -> Result<Vec<Instrument>, RegistryError>;
}

#[derive(Debug, Deserialize)]
struct RegistryEntry {
    symbol: String,
    name: String,
    sector: String,
}

/// Registry backed by a JSON file of `{symbol, name, sector}` entries.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl InstrumentRegistry for FileRegistry {
    fn list_tracked(&self) -> Result<Vec<Instrument>, RegistryError> {
        let path = self.path.display().to_string();
        let raw = std::fs::read_to_string(&self.path).map_err(|source| RegistryError::Io {
            path: path.clone(),
            source,
        })?;

        let entries: Vec<RegistryEntry> =
            serde_json::from_str(&raw).map_err(|source| RegistryError::Parse {
                path: path.clone(),
                source,
            })?;

        if entries.is_empty() {
            return Err(RegistryError::Empty);
        }

        entries
            .into_iter()
            .map(|entry| {
                let symbol = Symbol::parse(&entry.symbol).map_err(|e| {
                    RegistryError::InvalidEntry {
                        symbol: entry.symbol.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Instrument::new(symbol, entry.name, entry.sector).map_err(|e| {
                    RegistryError::InvalidEntry {
                        symbol: entry.symbol.clone(),
                        reason: e.to_string(),
                    }
                })
            })
            .collect()
    }
}

/// Fixed in-memory registry, mainly for tests and one-shot commands.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    instruments: Vec<Instrument>,
}

impl StaticRegistry {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments }
    }
}

impl InstrumentRegistry for StaticRegistry {
    fn list_tracked(&self) -> Result<Vec<Instrument>, RegistryError> {
        if self.instruments.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(self.instruments.clone())
    }
}

/// Built-in default universe used when the configured registry is unreadable.
///
/// Refreshing a known-good list beats refreshing nothing.
pub fn fallback_universe() -> Vec<Instrument> {
    [
        ("MC.PA", "LVMH", "Luxury"),
        ("OR.PA", "L'Oreal", "Consumer"),
        ("SAN.PA", "Sanofi", "Health"),
        ("AI.PA", "Air Liquide", "Industry"),
        ("FDJ.PA", "Francaise des Jeux", "Consumer"),
        ("AAPL", "Apple", "Technology"),
        ("MSFT", "Microsoft", "Technology"),
    ]
    .into_iter()
    .map(|(symbol, name, sector)| {
        Instrument::new(
            Symbol::parse(symbol).expect("fallback symbols are valid"),
            name,
            sector,
        )
        .expect("fallback entries are valid")
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_json_registry_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"[
                {{"symbol": "mc.pa", "name": "LVMH", "sector": "Luxury"}},
                {{"symbol": "SAN.PA", "name": "Sanofi", "sector": "Health"}}
            ]"#
        )
        .expect("write");

        let registry = FileRegistry::new(file.path());
        let instruments = registry.list_tracked().expect("list");

        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[0].symbol.as_str(), "MC.PA");
        assert_eq!(instruments[1].sector, "Health");
    }

    #[test]
    fn missing_file_reports_io_error() {
        let registry = FileRegistry::new("/nonexistent/tickers.json");
        let err = registry.list_tracked().expect_err("must fail");
        assert!(matches!(err, RegistryError::Io { .. }));
    }

    #[test]
    fn invalid_symbol_reports_entry_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"[{{"symbol": "!!", "name": "Broken", "sector": "None"}}]"#
        )
        .expect("write");

        let registry = FileRegistry::new(file.path());
        let err = registry.list_tracked().expect_err("must fail");
        assert!(matches!(err, RegistryError::InvalidEntry { .. }));
    }

    #[test]
    fn empty_registry_is_an_error() {
        let registry = StaticRegistry::default();
        assert!(matches!(
            registry.list_tracked(),
            Err(RegistryError::Empty)
        ));
    }

    #[test]
    fn fallback_universe_is_non_empty_and_sectored() {
        let universe = fallback_universe();
        assert!(universe.len() >= 5);
        assert!(universe.iter().all(|i| !i.sector.is_empty()));
    }
}
