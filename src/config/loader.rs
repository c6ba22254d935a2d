//! Config loading for biglog.
//!
//! Settings start from built-in defaults, then the global config is applied,
//! then the project config, key by key.

use std::fs;
use std::path::Path;

use crate::config::discovery::DiscoveryResult;
use crate::config::error::ConfigError;
use crate::config::types::{RawConfig, Settings};

/// Load and parse a YAML config file.
fn load_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    // An empty file is a valid config with no overrides.
    if content.trim().is_empty() {
        return Ok(RawConfig::default());
    }

    serde_saphyr::from_str(&content)
        .map_err(|e| ConfigError::from_saphyr_error(path.to_path_buf(), e))
}

fn validate(settings: &Settings, path: &Path) -> Result<(), ConfigError> {
    for (name, value) in settings.counts() {
        if value == 0 {
            return Err(ConfigError::Validation {
                path: path.to_path_buf(),
                message: format!("{} must be at least 1", name),
            });
        }
    }
    Ok(())
}

/// Defaults overridden by one file (for `config show` / `config validate`).
pub fn load_single_file(path: &Path) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();
    settings.apply(load_file(path)?);
    validate(&settings, path)?;
    Ok(settings)
}

/// Effective settings from discovered config files.
///
/// Returns defaults when no config file exists.
pub fn load(discovery: &DiscoveryResult) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();

    if let Some(global_path) = &discovery.global_config {
        settings.apply(load_file(global_path)?);
        validate(&settings, global_path)?;
    }

    if let Some(project_path) = &discovery.project_config {
        settings.apply(load_file(project_path)?);
        validate(&settings, project_path)?;
    }

    Ok(settings)
}
