//! Host configuration, read from a TOML file.
//!
//! Every field is optional in the file; missing fields take their defaults.
//! A missing file is the same as an empty one.

use std::path::{Path, PathBuf};

use gbhost_core::savestate::store::{DEFAULT_EXTENSION, DEFAULT_RETENTION_LIMIT};
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "gbhost";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config {}: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "malformed config {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Directory holding save files for every program.
    pub save_dir: PathBuf,
    pub save_extension: String,
    /// Manual saves kept per program. 0 behaves as 1.
    pub retention_limit: usize,
    pub frame_limiter: bool,
    /// Restore the auto slot when a program starts.
    pub auto_resume: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        let save_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("saves");
        Self {
            save_dir,
            save_extension: DEFAULT_EXTENSION.to_string(),
            retention_limit: DEFAULT_RETENTION_LIMIT,
            frame_limiter: true,
            auto_resume: true,
        }
    }
}

impl HostConfig {
    /// `<config dir>/gbhost/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HostConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.save_extension, "sav");
        assert_eq!(config.retention_limit, 10);
        assert!(config.frame_limiter);
        assert!(config.auto_resume);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "retention_limit = 3\nsave_dir = \"/tmp/saves\"\n").unwrap();

        let config = HostConfig::load(&path).unwrap();
        assert_eq!(config.retention_limit, 3);
        assert_eq!(config.save_dir, PathBuf::from("/tmp/saves"));
        assert_eq!(config.save_extension, "sav");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "retention_limit = \"many\"").unwrap();
        assert!(matches!(
            HostConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "retention = 3").unwrap();
        assert!(HostConfig::load(&path).is_err());
    }

    #[test]
    fn serialized_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = HostConfig {
            frame_limiter: false,
            ..HostConfig::default()
        };
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();
        assert_eq!(HostConfig::load(&path).unwrap(), config);
    }
}
