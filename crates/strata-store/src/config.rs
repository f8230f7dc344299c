//! Store configuration.
//!
//! Loaded from a TOML file; a missing or malformed file falls back to
//! defaults with a log line rather than failing startup.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::migration::MigrationOptions;

/// Default number of chunks written per transaction during a flush.
pub const DEFAULT_FLUSH_BATCH_CHUNKS: usize = 64;

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Relational database file
    pub database_path: PathBuf,
    /// Key-value export file, if the export backend is enabled
    pub kv_path: Option<PathBuf>,
    /// Replace tiles missing from the active tileset with the empty tile
    /// instead of refusing to load the realm
    pub force_migrate: bool,
    /// Chunks per transaction when flushing resident chunks
    pub flush_batch_chunks: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("world.db"),
            kv_path: None,
            force_migrate: false,
            flush_batch_chunks: DEFAULT_FLUSH_BATCH_CHUNKS,
        }
    }
}

impl StoreConfig {
    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or can't be parsed.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Store config not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read store config: {e}");
                    return Self::default();
                }

                match toml::from_str::<Self>(&contents) {
                    Ok(config) => {
                        info!("Loaded store config from {}", path.display());
                        config.validated()
                    },
                    Err(e) => {
                        warn!("Failed to parse store config: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open store config: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved store config to {}", path.display());
        Ok(())
    }

    /// Options for every migration run under this configuration.
    #[must_use]
    pub fn migration_options(&self) -> MigrationOptions {
        MigrationOptions {
            force: self.force_migrate,
        }
    }

    fn validated(mut self) -> Self {
        if self.flush_batch_chunks == 0 {
            warn!(
                "flush_batch_chunks must be positive, using {}",
                DEFAULT_FLUSH_BATCH_CHUNKS
            );
            self.flush_batch_chunks = DEFAULT_FLUSH_BATCH_CHUNKS;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StoreConfig::load_from(dir.path().join("store.toml"));
        assert_eq!(config, StoreConfig::default());
        assert!(!config.migration_options().force);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("store.toml");
        let config = StoreConfig {
            database_path: dir.path().join("realms.db"),
            kv_path: Some(dir.path().join("export.redb")),
            force_migrate: true,
            flush_batch_chunks: 8,
        };
        config.save_to(&path).expect("save");

        let loaded = StoreConfig::load_from(&path);
        assert_eq!(loaded, config);
        assert!(loaded.migration_options().force);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.toml");
        fs::write(&path, "force_migrate = true\nflush_batch_chunks = 0\n").expect("write");

        let config = StoreConfig::load_from(&path);
        assert!(config.force_migrate);
        assert_eq!(config.database_path, PathBuf::from("world.db"));
        assert_eq!(config.flush_batch_chunks, DEFAULT_FLUSH_BATCH_CHUNKS);
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.toml");
        fs::write(&path, "force_migrate = \"sometimes\"").expect("write");
        assert_eq!(StoreConfig::load_from(&path), StoreConfig::default());
    }
}
