//! Configuration for the mock server.
//!
//! Defines the listen address, global settings, configuration API tokens
//! and the mocks to register at startup.

use crate::mock::MockData;
use crate::validate::validate_mock_data;
use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Main configuration for the mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockServerConfig {
    /// Address to bind the HTTP listener to
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,

    /// Access control for the configuration API
    #[serde(default)]
    pub auth: AuthConfig,

    /// Mocks registered at startup, in the same shape the API accepts
    #[serde(default)]
    pub mocks: Vec<serde_json::Value>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            settings: GlobalSettings::default(),
            auth: AuthConfig::default(),
            mocks: Vec::new(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 4000))
}

impl MockServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (i, mock) in self.mocks.iter().enumerate() {
            validate_mock_data(mock).map_err(|e| anyhow::anyhow!("Mock {}: {}", i, e))?;
        }
        self.auth.validate()?;
        if self.settings.max_body_bytes == 0 {
            anyhow::bail!("settings.max_body_bytes must be greater than zero");
        }
        for origin in &self.settings.allowed_origins {
            if origin.trim() == "*" || HeaderValue::from_str(origin.trim()).is_err() {
                anyhow::bail!("Invalid allowed origin: {:?}", origin);
            }
        }
        Ok(())
    }

    /// Startup mocks as creation data.
    pub fn seed_mocks(&self) -> anyhow::Result<Vec<MockData>> {
        self.mocks
            .iter()
            .enumerate()
            .map(|(i, mock)| {
                serde_json::from_value(mock.clone())
                    .map_err(|e| anyhow::anyhow!("Mock {}: {}", i, e))
            })
            .collect()
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log every request resolved to a mock
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log requests no mock answered
    #[serde(default = "default_true")]
    pub log_unmatched: bool,

    /// Maximum accepted request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Origins allowed by CORS. Empty allows any origin, without credentials.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
            max_body_bytes: default_max_body_bytes(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

/// Bearer tokens accepted by the configuration API.
///
/// With no tokens configured, any well-formed bearer token is accepted
/// and treated as an administrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<TokenGrant>,
}

impl AuthConfig {
    /// Shortest token that is accepted at all.
    pub const MIN_TOKEN_LEN: usize = 10;

    pub fn validate(&self) -> anyhow::Result<()> {
        for grant in &self.tokens {
            if grant.token.len() < Self::MIN_TOKEN_LEN {
                anyhow::bail!(
                    "Token for {} must be at least {} characters",
                    grant.id,
                    Self::MIN_TOKEN_LEN
                );
            }
        }
        Ok(())
    }
}

/// A token and the principal it authenticates as.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenGrant {
    pub token: String,
    pub id: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "admin".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::HttpMethod;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MockServerConfig::default();
        assert_eq!(config.listen.port(), 4000);
        assert!(config.settings.log_matches);
        assert_eq!(config.settings.max_body_bytes, 2 * 1024 * 1024);
        assert!(config.auth.tokens.is_empty());
        assert!(config.mocks.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
listen: 127.0.0.1:8080
settings:
  log_matches: false
auth:
  tokens:
    - token: reader-token-123
      id: ci
      role: viewer
    - token: admin-token-456
      id: ops
mocks:
  - route: /hello
    method: GET
    responseContent:
      message: "Hello, World!"
  - route: /users/:id
    method: get
    responseContent:
      id: "{{routeParams.id}}"
"#;
        let config = MockServerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.listen.port(), 8080);
        assert!(!config.settings.log_matches);
        assert!(config.settings.log_unmatched);
        assert_eq!(config.auth.tokens[0].role, "viewer");
        assert_eq!(config.auth.tokens[1].role, "admin");

        let seeds = config.seed_mocks().unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].method, HttpMethod::Get);
        assert_eq!(seeds[1].response_content["id"], "{{routeParams.id}}");
    }

    #[test]
    fn test_invalid_seed_mock_rejected() {
        let yaml = r#"
mocks:
  - route: no-slash
    method: GET
"#;
        let err = MockServerConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Mock 0"));
        assert!(err.to_string().contains("Route must start with /"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let yaml = "routes: []\n";
        assert!(MockServerConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_allowed_origins() {
        let yaml = r#"
settings:
  allowed_origins:
    - https://app.example.com
    - http://localhost:3000
"#;
        let config = MockServerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.settings.allowed_origins.len(), 2);

        let yaml = "settings:\n  allowed_origins: [\"*\"]\n";
        assert!(MockServerConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_short_token_rejected() {
        let yaml = r#"
auth:
  tokens:
    - token: short
      id: x
"#;
        assert!(MockServerConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen: 0.0.0.0:9999").unwrap();
        writeln!(file, "mocks:").unwrap();
        writeln!(file, "  - {{route: /ping, method: get, responseContent: pong}}").unwrap();

        let config = MockServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.listen.port(), 9999);
        assert_eq!(config.seed_mocks().unwrap()[0].response_content, "pong");
    }

    #[test]
    fn test_default_config_file_parses() {
        let yaml = include_str!("../config/default-config.yaml");
        let config = MockServerConfig::from_yaml(yaml).unwrap();
        assert!(!config.seed_mocks().unwrap().is_empty());
    }
}
