//! Client configuration: backend endpoint, deployment environment, timeouts.
//!
//! Values come from an optional JSON file (camelCase keys) and are then
//! overridden by environment variables:
//!
//! | Variable | Field |
//! |---|---|
//! | `ETU_BACKEND_URL` | `endpoint` (`host:port`) |
//! | `ETU_ENV` | `environment` |
//! | `ETU_USE_TLS` | `useEncryptedTransport` |

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const ENV_BACKEND_URL: &str = "ETU_BACKEND_URL";
pub const ENV_ENVIRONMENT: &str = "ETU_ENV";
pub const ENV_USE_TLS: &str = "ETU_USE_TLS";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 50051;

const KNOWN_KEYS: &[&str] = &[
    "endpoint",
    "environment",
    "useEncryptedTransport",
    "connectTimeoutMs",
    "callTimeoutMs",
];

/// Deployment environment. Only `Production` changes client behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Environment {
    Production,
    #[default]
    Development,
    Test,
}

impl Environment {
    /// Total: unrecognized names are treated as development.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }

    #[must_use]
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Development => "development",
            Environment::Test => "test",
        }
    }
}

impl From<String> for Environment {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<Environment> for String {
    fn from(env: Environment) -> Self {
        env.as_str().to_string()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network target of the backend, `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host:port`. IPv6 hosts must be bracketed (`[::1]:50051`).
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the host is empty or the port is missing or invalid.
    pub fn parse(target: &str) -> Result<Self> {
        let target = target.trim();
        let Some((host, port)) = target.rsplit_once(':') else {
            return Err(Error::Config(format!(
                "endpoint `{target}` must be in host:port form"
            )));
        };

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(Error::Config(format!("endpoint `{target}` has no host")));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| Error::Config(format!("endpoint `{target}` has invalid port: {e}")))?;

        Ok(Self::new(host, port))
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl TryFrom<String> for Endpoint {
    type Error = Error;

    fn try_from(target: String) -> Result<Self> {
        Self::parse(&target)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_call_timeout_ms() -> u64 {
    30_000
}

/// Configuration handed to the client registry at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default)]
    pub endpoint: Endpoint,

    #[serde(default)]
    pub environment: Environment,

    /// Explicit transport security choice; derived from `environment` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_encrypted_transport: Option<bool>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-call deadline enforced by the channel.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            environment: Environment::default(),
            use_encrypted_transport: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Whether channels use TLS.
    #[must_use]
    pub fn encrypted_transport(&self) -> bool {
        self.use_encrypted_transport
            .unwrap_or_else(|| self.environment.is_production())
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Load config from a JSON file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or is not valid config JSON.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        warn_unknown_fields(&content, &path.display().to_string());

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if an environment variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (an environment variable reader).
    /// Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a variable holds an invalid endpoint or flag.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_BACKEND_URL) {
            self.endpoint = Endpoint::parse(&url)?;
        }

        if let Some(env) = get(ENV_ENVIRONMENT) {
            self.environment = Environment::parse(&env);
        }

        if let Some(flag) = get(ENV_USE_TLS) {
            self.use_encrypted_transport = Some(parse_flag(&flag).ok_or_else(|| {
                Error::Config(format!("{ENV_USE_TLS} must be a boolean, got `{flag}`"))
            })?);
        }

        Ok(self)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Warn about top-level keys the client does not recognize.
pub fn warn_unknown_fields(content: &str, config_name: &str) {
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(content) else {
        return;
    };

    for key in obj.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            warn!("Unknown config field in {config_name}: {key}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint.to_string(), "localhost:50051");
        assert_eq!(config.environment, Environment::Development);
        assert!(!config.encrypted_transport());
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_production_implies_tls() {
        assert!(ClientConfig::for_environment(Environment::Production).encrypted_transport());
        assert!(!ClientConfig::for_environment(Environment::Test).encrypted_transport());
    }

    #[test]
    fn test_explicit_flag_wins() {
        let mut config = ClientConfig::for_environment(Environment::Production);
        config.use_encrypted_transport = Some(false);
        assert!(!config.encrypted_transport());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse(" PRODUCTION "), Environment::Production);
        assert_eq!(Environment::parse("test"), Environment::Test);
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert_eq!(Environment::parse(""), Environment::Development);
    }

    #[test]
    fn test_endpoint_parse() {
        let endpoint = Endpoint::parse("api.etu.example:443").unwrap();
        assert_eq!(endpoint.host(), "api.etu.example");
        assert_eq!(endpoint.port(), 443);

        let endpoint = Endpoint::parse("[::1]:50051").unwrap();
        assert_eq!(endpoint.host(), "::1");
        assert_eq!(endpoint.to_string(), "[::1]:50051");
    }

    #[test]
    fn test_endpoint_parse_errors() {
        assert!(matches!(Endpoint::parse("localhost"), Err(Error::Config(_))));
        assert!(matches!(Endpoint::parse(":50051"), Err(Error::Config(_))));
        assert!(matches!(Endpoint::parse("host:99999"), Err(Error::Config(_))));
        assert!(matches!(Endpoint::parse("host:"), Err(Error::Config(_))));
    }

    #[test]
    fn test_apply_env_overrides() {
        let config = ClientConfig::default()
            .apply_env(lookup(&[
                (ENV_BACKEND_URL, "backend.internal:9000"),
                (ENV_ENVIRONMENT, "production"),
            ]))
            .unwrap();

        assert_eq!(config.endpoint, Endpoint::new("backend.internal", 9000));
        assert_eq!(config.environment, Environment::Production);
        assert!(config.encrypted_transport());
    }

    #[test]
    fn test_apply_env_tls_override() {
        let config = ClientConfig::default()
            .apply_env(lookup(&[(ENV_ENVIRONMENT, "production"), (ENV_USE_TLS, "false")]))
            .unwrap();
        assert!(!config.encrypted_transport());

        let result = ClientConfig::default().apply_env(lookup(&[(ENV_USE_TLS, "maybe")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_apply_env_ignores_empty_values() {
        let config = ClientConfig::default()
            .apply_env(lookup(&[(ENV_BACKEND_URL, ""), (ENV_ENVIRONMENT, "  ")]))
            .unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_apply_env_invalid_endpoint() {
        let result = ClientConfig::default().apply_env(lookup(&[(ENV_BACKEND_URL, "nope")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(&dir.path().join("missing.json")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"endpoint": "10.0.0.5:7000", "environment": "production", "callTimeoutMs": 500}"#,
        )
        .unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.endpoint, Endpoint::new("10.0.0.5", 7000));
        assert!(config.encrypted_transport());
        assert_eq!(config.call_timeout(), Duration::from_millis(500));
        assert_eq!(config.connect_timeout_ms, 10_000);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"endpoint": "no-port"}"#).unwrap();
        assert!(matches!(ClientConfig::load(&path), Err(Error::Config(_))));

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(ClientConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_serialization_roundtrip_keys() {
        let json = serde_json::to_value(ClientConfig::default()).unwrap();
        assert_eq!(json["endpoint"], "localhost:50051");
        assert_eq!(json["environment"], "development");
        assert!(json.get("useEncryptedTransport").is_none());
        for key in json.as_object().unwrap().keys() {
            assert!(KNOWN_KEYS.contains(&key.as_str()), "unlisted key {key}");
        }
    }
}
