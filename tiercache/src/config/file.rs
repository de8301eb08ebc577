//! Configuration file handling for `~/.config/tiercache/config.ini`.
//!
//! Settings structs live in [`super::settings`], constants in
//! [`super::defaults`] and INI parsing in [`super::parser`].

use ini::Ini;
use std::path::Path;
use thiserror::Error;

use super::defaults::config_file_path;
use super::settings::RegistryConfig;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Config text is not valid INI
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] ini::ParseError),

    /// Section name is not recognized
    #[error("Unknown configuration section [{0}]")]
    UnknownSection(String),

    /// Key is not valid in its section
    #[error("Unknown configuration key {section}.{key} = '{value}'")]
    UnknownKey {
        section: String,
        key: String,
        value: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl RegistryConfig {
    /// Load configuration from the default path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(content)?;
        super::parser::parse_ini(&ini)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = RegistryConfig::load_from(&temp_dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, RegistryConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(
            &config_path,
            r#"
[registry]
root = /srv/cache

[cache:sessions]
memory_capacity = 10
"#,
        )
        .unwrap();

        let config = RegistryConfig::load_from(&config_path).unwrap();
        assert_eq!(config.root, Path::new("/srv/cache"));
        assert_eq!(config.cache("sessions").map(|c| c.memory_capacity), Some(10));
    }

    #[test]
    fn test_malformed_ini() {
        let result = RegistryConfig::from_ini_str("[registry\nroot = /x\n");
        assert!(matches!(result, Err(ConfigFileError::ParseError(_))));
    }
}
