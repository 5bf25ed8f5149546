//! Daemon settings: optional TOML file overlaid by `SLOTBOOK_*` environment variables.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use slotbook_core::EngineConfig;

/// Default settings file, looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "slotbook.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Tracing filter used when `RUST_LOG` is unset
    pub log_filter: String,
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("slotbook.db"),
            log_filter: "info,slotbook_core=debug".to_string(),
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path` (or [`DEFAULT_SETTINGS_FILE`]) and the environment.
    ///
    /// Nested keys use a double underscore, e.g. `SLOTBOOK_ENGINE__HOLD_DURATION_SECS=300`.
    /// A missing file is fine; an explicitly named one must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_SETTINGS_FILE).required(false),
        };

        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("SLOTBOOK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: Self = settings.try_deserialize()?;

        if config.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Message("database_path must not be empty".to_string()));
        }
        config.engine.validate().map_err(ConfigError::Message)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotbook_core::CancellationMode;
    use std::io::Write;

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
database_path = "/var/lib/slotbook/book.db"

[engine]
hold_duration_secs = 300
cancellation = "delete"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/slotbook/book.db"));
        assert_eq!(config.log_filter, AppConfig::default().log_filter);
        assert_eq!(config.engine.hold_duration_secs, 300);
        assert_eq!(config.engine.cancellation, CancellationMode::Delete);
        assert!(config.engine.requires_confirmation);
        assert_eq!(config.engine.reap_batch_size, 100);
    }

    #[test]
    fn test_named_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(AppConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_oversized_hold_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[engine]\nhold_duration_secs = 10000000000000").unwrap();
        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("hold_duration_secs"));
    }

    #[test]
    fn test_empty_database_path_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, r#"database_path = """#).unwrap();
        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("database_path"));
    }
}
