//! Core configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the Chorus core server.
///
/// All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port for the HTTP/WS server.
    pub preferred_port: u16,

    /// Base path all routes are mounted under (e.g. `/music`).
    /// Empty means the server root.
    pub base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 8787,
            base_path: String::new(),
        }
    }
}

impl Config {
    /// Returns the base path normalized to either `""` or `/prefix` form.
    pub fn normalized_base_path(&self) -> String {
        let trimmed = self.base_path.trim().trim_end_matches('/');
        if trimmed.is_empty() || trimmed == "/" {
            return String::new();
        }
        if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_is_normalized() {
        let mut config = Config::default();
        assert_eq!(config.normalized_base_path(), "");

        config.base_path = "/".into();
        assert_eq!(config.normalized_base_path(), "");

        config.base_path = "music/".into();
        assert_eq!(config.normalized_base_path(), "/music");

        config.base_path = "/music".into();
        assert_eq!(config.normalized_base_path(), "/music");
    }
}
