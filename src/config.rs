use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults — the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Number of parallel workers. 0 = auto-detect (available cores).
    pub workers: usize,
    /// Default analysis settings file (used when `analyze` has no --settings).
    pub settings_path: Option<PathBuf>,
    /// Default calibration file (used when `analyze` has no --calibration).
    pub calibration_path: Option<PathBuf>,
    /// File extensions to discover (overrides the built-in wav/flac list).
    pub extensions: Vec<String>,
}

impl AppConfig {
    /// Load config from `~/.config/acoustat/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => {
                        match toml::from_str::<AppConfig>(&contents) {
                            Ok(config) => {
                                log::info!("Loaded config from {}", path.display());
                                config
                            }
                            Err(e) => {
                                log::warn!(
                                    "Failed to parse {}: {}. Using defaults.",
                                    path.display(),
                                    e
                                );
                                Self::default()
                            }
                        }
                    }
                    Err(e) => {
                        log::warn!(
                            "Failed to read {}: {}. Using defaults.",
                            path.display(),
                            e
                        );
                        Self::default()
                    }
                }
            }
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Resolve worker count: 0 → auto-detect from available parallelism.
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2)
        }
    }

    /// Extensions to discover: configured list, or the built-in default.
    pub fn resolve_extensions(&self) -> Vec<String> {
        if self.extensions.is_empty() {
            crate::SUPPORTED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect()
        } else {
            self.extensions.iter().map(|e| e.to_lowercase()).collect()
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_extensions() {
        let config = AppConfig::default();
        assert_eq!(config.resolve_extensions(), vec!["wav", "flac"]);
    }

    #[test]
    fn test_configured_extensions_lowercased() {
        let config = AppConfig {
            extensions: vec!["WAV".into()],
            ..AppConfig::default()
        };
        assert_eq!(config.resolve_extensions(), vec!["wav"]);
    }

    #[test]
    fn test_resolve_workers_explicit() {
        let config = AppConfig {
            workers: 3,
            ..AppConfig::default()
        };
        assert_eq!(config.resolve_workers(), 3);
        assert!(AppConfig::default().resolve_workers() >= 1);
    }
}
