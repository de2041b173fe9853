//! Client configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::typewriter::TypewriterConfig;

/// Router prefix of the reference chat backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/chat";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Settings for [`crate::ChatClient`]. Every field has a default so partial
/// config files deserialize.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL the endpoint paths are appended to.
    pub base_url: String,
    /// Total timeout for non-streaming calls. Streams are not bounded.
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub typewriter: TypewriterConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            typewriter: TypewriterConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_typewriter(mut self, typewriter: TypewriterConfig) -> Self {
        self.typewriter = typewriter;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{ "base_url": "http://chat.internal/api/chat", "typewriter": { "chunk_delay_ms": 0 } }"#,
        )
        .unwrap();

        assert_eq!(config.base_url, "http://chat.internal/api/chat");
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.typewriter.chunk_delay_ms, 0);
        assert_eq!(
            config.typewriter.chunk_chars,
            TypewriterConfig::default().chunk_chars
        );
    }
}
