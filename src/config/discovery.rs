//! Config discovery for biglog.
//!
//! Walks parent directories to find `biglog.yaml` and checks for a global
//! config at `<config dir>/biglog/config.yaml`.

use std::path::{Path, PathBuf};

/// Project config filename to search for in parent directories.
pub const PROJECT_CONFIG_NAME: &str = "biglog.yaml";

/// Global config filename within the biglog config directory.
pub const GLOBAL_CONFIG_NAME: &str = "config.yaml";

const APP_DIR_NAME: &str = "biglog";

/// Paths of the config files that apply to the current directory.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    /// Nearest `biglog.yaml` in the starting directory or an ancestor.
    pub project_config: Option<PathBuf>,
    /// Per-user config, if present.
    pub global_config: Option<PathBuf>,
}

impl DiscoveryResult {
    pub fn has_config(&self) -> bool {
        self.project_config.is_some() || self.global_config.is_some()
    }

    /// The single file that wins when only one config is shown: project over global.
    pub fn closest(&self) -> Option<&Path> {
        self.project_config
            .as_deref()
            .or(self.global_config.as_deref())
    }
}

pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(GLOBAL_CONFIG_NAME))
}

/// Discover config files starting from the current working directory.
pub fn discover() -> DiscoveryResult {
    match std::env::current_dir() {
        Ok(dir) => discover_from(&dir.canonicalize().unwrap_or(dir)).0,
        Err(_) => DiscoveryResult {
            project_config: None,
            global_config: existing_file(global_config_path()),
        },
    }
}

/// Discover config files starting from `start`.
///
/// Also returns every directory that was checked, nearest first.
pub fn discover_from(start: &Path) -> (DiscoveryResult, Vec<PathBuf>) {
    let mut result = DiscoveryResult {
        project_config: None,
        global_config: existing_file(global_config_path()),
    };
    let mut searched = Vec::new();

    for ancestor in start.ancestors() {
        searched.push(ancestor.to_path_buf());
        let candidate = ancestor.join(PROJECT_CONFIG_NAME);
        if candidate.is_file() {
            result.project_config = Some(candidate);
            break;
        }
    }

    log::debug!(
        "config discovery searched {} directories: project={:?} global={:?}",
        searched.len(),
        result.project_config,
        result.global_config
    );
    (result, searched)
}

fn existing_file(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| p.is_file())
}
