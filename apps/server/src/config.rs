//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to.
    /// Override: `CHORUS_BIND_PORT`
    pub bind_port: u16,

    /// Base path all routes are mounted under.
    /// Override: `CHORUS_BASE_PATH`
    pub base_path: String,

    /// Stable secret for signing stream tokens. When unset, a fresh key is
    /// generated at startup and tokens do not survive a restart.
    /// Override: `CHORUS_SIGNING_SECRET`
    pub signing_secret: Option<String>,

    /// Path to the media library manifest (YAML).
    /// Override: `CHORUS_LIBRARY_MANIFEST`
    pub library_manifest: Option<PathBuf>,

    /// Directory that relative media paths in the manifest resolve against.
    /// Override: `CHORUS_MEDIA_DIR`
    pub media_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_port: 8787,
            base_path: String::new(),
            signing_secret: None,
            library_manifest: None,
            media_dir: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CHORUS_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("CHORUS_BASE_PATH") {
            self.base_path = val;
        }

        if let Ok(val) = std::env::var("CHORUS_SIGNING_SECRET") {
            if !val.is_empty() {
                self.signing_secret = Some(val);
            }
        }

        if let Ok(val) = std::env::var("CHORUS_LIBRARY_MANIFEST") {
            if !val.is_empty() {
                self.library_manifest = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("CHORUS_MEDIA_DIR") {
            if !val.is_empty() {
                self.media_dir = Some(PathBuf::from(val));
            }
        }
    }

    /// Converts to chorus-core's Config type.
    pub fn to_core_config(&self) -> chorus_core::Config {
        chorus_core::Config {
            preferred_port: self.bind_port,
            base_path: self.base_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sensible() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_port, 8787);
        assert!(config.base_path.is_empty());
        assert!(config.signing_secret.is_none());
        assert!(config.library_manifest.is_none());
    }

    #[test]
    fn loads_yaml_with_partial_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind_port: 9000\nbase_path: /music").unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.bind_port, 9000);
        assert_eq!(config.base_path, "/music");
        // Unspecified fields keep their defaults.
        assert!(config.library_manifest.is_none());
    }

    #[test]
    fn rejects_malformed_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind_port: [not a port").unwrap();
        assert!(ServerConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn converts_to_core_config() {
        let config = ServerConfig {
            bind_port: 9100,
            base_path: "/lt".into(),
            signing_secret: Some("secret".into()),
            ..Default::default()
        };
        let core = config.to_core_config();
        assert_eq!(core.preferred_port, 9100);
        assert_eq!(core.base_path, "/lt");
    }
}
