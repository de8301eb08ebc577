//! INI parsing logic for converting `Ini` → `RegistryConfig`.
//!
//! This is the single place where INI section and key names are mapped to
//! struct fields. Anything not recognized here is rejected.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::time::Duration;

use super::duration::parse_duration;
use super::file::ConfigFileError;
use super::settings::{CacheConfig, RegistryConfig};

const REGISTRY_SECTION: &str = "registry";
const DEFAULTS_SECTION: &str = "defaults";
const CACHE_SECTION_PREFIX: &str = "cache:";

/// Parse an `Ini` object into a `RegistryConfig`.
///
/// Starts from `RegistryConfig::default()` and overlays any values found in
/// the INI. `[defaults]` is applied before any `[cache:NAME]` section, so
/// every declared cache inherits it regardless of section order.
pub(super) fn parse_ini(ini: &Ini) -> Result<RegistryConfig, ConfigFileError> {
    let mut config = RegistryConfig::default();

    for (section, properties) in ini.iter() {
        match section {
            None => {
                if let Some((key, value)) = properties.iter().next() {
                    return Err(unknown_key("", key, value));
                }
            }
            Some(REGISTRY_SECTION) | Some(DEFAULTS_SECTION) => {}
            Some(name) if cache_section_name(name).is_some() => {}
            Some(name) => return Err(ConfigFileError::UnknownSection(name.to_string())),
        }
    }

    // [registry] section
    if let Some(section) = ini.section(Some(REGISTRY_SECTION)) {
        for (key, value) in section.iter() {
            match key {
                "root" => {
                    let v = value.trim();
                    if v.is_empty() {
                        return Err(invalid_value(
                            REGISTRY_SECTION,
                            key,
                            value,
                            "must not be empty",
                        ));
                    }
                    config.root = expand_tilde(v);
                }
                _ => return Err(unknown_key(REGISTRY_SECTION, key, value)),
            }
        }
    }

    // [defaults] section
    if let Some(section) = ini.section(Some(DEFAULTS_SECTION)) {
        apply_cache_section(DEFAULTS_SECTION, section, &mut config.default_cache)?;
    }

    // [cache:NAME] sections
    for (section, properties) in ini.iter() {
        let Some(section) = section else { continue };
        let Some(name) = cache_section_name(section) else {
            continue;
        };
        let mut cache = config.default_cache.clone();
        apply_cache_section(section, properties, &mut cache)?;
        config = config.with_cache(name, cache);
    }

    Ok(config)
}

/// Cache name of a `[cache:NAME]` section, if the section is one.
fn cache_section_name(section: &str) -> Option<&str> {
    section
        .strip_prefix(CACHE_SECTION_PREFIX)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Overlay per-cache keys onto `cache`.
fn apply_cache_section(
    section: &str,
    properties: &Properties,
    cache: &mut CacheConfig,
) -> Result<(), ConfigFileError> {
    for (key, value) in properties.iter() {
        match key {
            "memory_capacity" => {
                cache.memory_capacity = parse_count(section, key, value)?;
            }
            "disk_capacity" => {
                cache.disk_capacity = parse_count(section, key, value)?;
            }
            "disk_persistent" => {
                cache.disk_persistent = parse_flag(section, key, value)?;
            }
            "default_eternal" => {
                cache.default_eternal = parse_flag(section, key, value)?;
            }
            "sweep_interval" => {
                cache.sweep_interval = parse_interval(section, key, value)?;
            }
            "disk_io_timeout" => {
                cache.disk_io_timeout = parse_interval(section, key, value)?;
            }
            _ => return Err(unknown_key(section, key, value)),
        }
    }
    Ok(())
}

fn parse_count(section: &str, key: &str, value: &str) -> Result<usize, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid_value(section, key, value, "must be a non-negative integer"))
}

fn parse_flag(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    parse_bool(value)
        .ok_or_else(|| invalid_value(section, key, value, "must be true/false, yes/no or 1/0"))
}

fn parse_interval(section: &str, key: &str, value: &str) -> Result<Duration, ConfigFileError> {
    match parse_duration(value) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        Ok(_) => Err(invalid_value(section, key, value, "must be greater than zero")),
        Err(e) => Err(invalid_value(section, key, value, &e.to_string())),
    }
}

/// Parse a boolean value from a config string.
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive)
pub(super) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn unknown_key(section: &str, key: &str, value: &str) -> ConfigFileError {
    ConfigFileError::UnknownKey {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn invalid_value(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
