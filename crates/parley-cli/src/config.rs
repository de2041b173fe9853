//! CLI configuration file support
//!
//! Loads configuration from ~/.config/parley/config.toml

use parley_client::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Chat client settings
    #[serde(default)]
    pub client: ClientConfig,
}

impl CliConfig {
    /// Load configuration from default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|err| {
                eprintln!("Ignoring invalid config file {}: {err}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("parley").join("config.toml"))
    }

    /// Client settings with the command-line base URL applied on top.
    pub fn client_config(&self, base_url: Option<&str>) -> ClientConfig {
        let mut config = self.client.clone();
        if let Some(url) = base_url.map(str::trim).filter(|url| !url.is_empty()) {
            config.base_url = url.to_string();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = CliConfig::load_from_path(Some(PathBuf::from("/nonexistent/parley.toml")));
        assert_eq!(config.client, ClientConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[client]\nbase_url = \"http://chat.internal/api/chat\"\n\n[client.typewriter]\nchunk_delay_ms = 0"
        )
        .unwrap();

        let config = CliConfig::load_from_path(Some(file.path().to_path_buf()));
        assert_eq!(config.client.base_url, "http://chat.internal/api/chat");
        assert_eq!(config.client.typewriter.chunk_delay_ms, 0);
        assert_eq!(config.client.request_timeout_secs, 60);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "client = 3").unwrap();

        let config = CliConfig::load_from_path(Some(file.path().to_path_buf()));
        assert_eq!(config.client, ClientConfig::default());
    }

    #[test]
    fn test_flag_overrides_file() {
        let config = CliConfig::default();
        assert_eq!(
            config.client_config(Some("http://other:9000/api/chat")).base_url,
            "http://other:9000/api/chat"
        );
        assert_eq!(
            config.client_config(Some("  ")).base_url,
            ClientConfig::default().base_url
        );
    }
}
