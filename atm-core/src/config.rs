//! Configuration management
//!
//! Settings live in `settings.json` in the data directory:
//! ```json
//! {
//!   "security": { "argon2": { "memoryCost": 65536, "timeCost": 3, "parallelism": 4 } },
//!   "database": { "filename": "atm.duckdb" }
//! }
//! ```
//! Keys this crate does not manage are kept as-is when saving.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::Argon2Params;

pub const SETTINGS_FILENAME: &str = "settings.json";
pub const DEFAULT_DATABASE_FILENAME: &str = "atm.duckdb";

/// Environment variable overriding the Argon2 memory cost (KiB)
pub const ARGON2_MEMORY_ENV: &str = "ATM_ARGON2_MEMORY_COST";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    security: SecuritySettings,
    #[serde(default)]
    database: DatabaseSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecuritySettings {
    #[serde(default)]
    argon2: Argon2Params,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseSettings {
    #[serde(default = "default_database_filename")]
    filename: String,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            filename: default_database_filename(),
            other: HashMap::new(),
        }
    }
}

fn default_database_filename() -> String {
    DEFAULT_DATABASE_FILENAME.to_string()
}

/// ATM configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    pub argon2: Argon2Params,
    pub database_filename: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            argon2: Argon2Params::default(),
            database_filename: default_database_filename(),
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// A missing settings file yields defaults. A malformed one is an error
    /// rather than silently weakening the credential parameters.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(&data_dir.join(SETTINGS_FILENAME))?;

        let mut argon2 = raw.security.argon2;
        if let Ok(value) = std::env::var(ARGON2_MEMORY_ENV) {
            argon2.memory_cost = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of KiB, got {:?}", ARGON2_MEMORY_ENV, value))?;
        }

        Ok(Self {
            argon2,
            database_filename: raw.database.filename,
        })
    }

    /// Save config to the data directory, preserving unmanaged settings
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join(SETTINGS_FILENAME);

        let mut settings = read_settings(&settings_path)?;
        settings.security.argon2 = self.argon2.clone();
        settings.database.filename = self.database_filename.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)
            .with_context(|| format!("Failed to write {}", settings_path.display()))?;
        Ok(())
    }
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid settings in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();

        assert_eq!(config.database_filename, "atm.duckdb");
        assert_eq!(config.argon2.time_cost, 3);
    }

    #[test]
    fn test_partial_settings_fill_in_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILENAME),
            r#"{ "security": { "argon2": { "timeCost": 5 } } }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.argon2.time_cost, 5);
        assert_eq!(config.argon2.parallelism, 4);
        assert_eq!(config.database_filename, "atm.duckdb");
    }

    #[test]
    fn test_malformed_settings_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILENAME), "{ not json").unwrap();

        assert!(Config::load(dir.path()).is_err());
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILENAME),
            r#"{ "theme": "dark", "database": { "filename": "bank.duckdb", "readOnly": true } }"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        assert_eq!(config.database_filename, "bank.duckdb");

        config.argon2 = Argon2Params::minimal();
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(SETTINGS_FILENAME)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["theme"], "dark");
        assert_eq!(value["database"]["readOnly"], true);
        assert_eq!(value["database"]["filename"], "bank.duckdb");
        assert_eq!(value["security"]["argon2"]["memoryCost"], 8);
    }
}
