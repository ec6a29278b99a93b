// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file and environment support for mantic
//!
//! Loads configuration from .manticrc.toml in the scan root or
//! ~/.config/mantic/config.toml, then applies MANTIC_* environment
//! overrides. CLI flags win over both.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_FILES: usize = 300;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Configuration loaded from .manticrc.toml or ~/.config/mantic/config.toml
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of files to return
    pub max_files: Option<usize>,
    /// Overall scan timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Glob patterns appended to the built-in ignore set
    pub ignore_patterns: Vec<String>,
}

impl Config {
    /// Load configuration for a scan root.
    ///
    /// Precedence (highest to lowest):
    /// 1. MANTIC_* environment variables
    /// 2. .manticrc.toml in the scan root
    /// 3. ~/.config/mantic/config.toml
    pub fn load_for_dir(root: &Path) -> Self {
        let mut config = Self::load_file(root).unwrap_or_default();
        config.apply_env();
        config
    }

    fn load_file(root: &Path) -> Option<Self> {
        if let Some(config) = Self::load_from_path(&root.join(".manticrc.toml")) {
            return Some(config);
        }
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("mantic").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return Some(config);
            }
        }
        None
    }

    fn load_from_path(path: &PathBuf) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    fn apply_env(&mut self) {
        if let Some(value) = env_usize("MANTIC_MAX_FILES") {
            if value >= 1 {
                self.max_files = Some(value);
            }
        }
        if let Some(value) = env_u64("MANTIC_TIMEOUT") {
            self.timeout_ms = Some(value);
        }
        if let Ok(raw) = std::env::var("MANTIC_IGNORE_PATTERNS") {
            for pattern in raw.split(',') {
                let trimmed = pattern.trim();
                if !trimmed.is_empty() {
                    self.ignore_patterns.push(trimmed.to_string());
                }
            }
        }
    }

    /// Merge a CLI-supplied limit with config (CLI wins).
    pub fn merge_max_files(&self, cli_value: Option<usize>) -> usize {
        cli_value
            .or(self.max_files)
            .unwrap_or(DEFAULT_MAX_FILES)
            .max(1)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.trim().parse().ok()
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_config() {
        let config = Config::default();
        assert_eq!(config.merge_max_files(None), DEFAULT_MAX_FILES);
        assert_eq!(config.scan_timeout(), Duration::from_millis(30_000));
    }

    #[test]
    fn cli_value_wins_over_config() {
        let config = Config {
            max_files: Some(50),
            ..Default::default()
        };
        assert_eq!(config.merge_max_files(Some(10)), 10);
        assert_eq!(config.merge_max_files(None), 50);
    }

    #[test]
    fn max_files_floor_is_one() {
        let config = Config {
            max_files: Some(0),
            ..Default::default()
        };
        assert_eq!(config.merge_max_files(None), 1);
    }
}
