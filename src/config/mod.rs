use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Complete thingmap configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThingmapConfig {
    #[serde(default)]
    pub source: SourceConfig,
}

/// Backend connection settings
#[derive(Clone, Deserialize)]
pub struct SourceConfig {
    /// Backend base URL, without the `/api/2` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Precomputed Basic credential, sent verbatim
    #[serde(default)]
    pub auth_token: String,

    /// Used to build the credential when `auth_token` is empty
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,

    /// Bulk fetch timeout; the push stream has none
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token: String::new(),
            username: None,
            password: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

// Credentials stay out of logs
impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("base_url", &self.base_url)
            .field("auth_token", &redact(&self.auth_token))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "***"
    }
}

impl SourceConfig {
    /// Build from env vars, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env(|key| std::env::var(key).ok());
        cfg
    }

    /// Override fields from `DITTO_*` variables found by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DITTO_BASE") {
            self.base_url = v;
        }
        if let Some(v) = lookup("DITTO_AUTH_TOKEN") {
            self.auth_token = v;
        }
        if let Some(v) = lookup("DITTO_USERNAME") {
            self.username = Some(v);
        }
        if let Some(v) = lookup("DITTO_PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = lookup("DITTO_TIMEOUT") {
            if let Ok(n) = v.parse::<u64>() {
                self.timeout_seconds = n;
            }
        }
    }

    /// Base URL with any trailing slash removed
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Value for the `Authorization` header.
    ///
    /// A non-empty token wins; otherwise username/password are encoded;
    /// otherwise the empty token is sent.
    pub fn authorization(&self) -> String {
        if !self.auth_token.is_empty() {
            return format!("Basic {}", self.auth_token);
        }
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => {
                format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass)))
            }
            _ => "Basic ".to_string(),
        }
    }
}

/// Config loading errors
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "invalid config file: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<ThingmapConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&contents).map_err(ConfigError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ThingmapConfig::default();
        assert_eq!(config.source.base_url, "http://localhost:8080");
        assert_eq!(config.source.auth_token, "");
        assert_eq!(config.source.timeout_seconds, 10);
        assert_eq!(config.source.authorization(), "Basic ");
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = SourceConfig::default();
        cfg.apply_env(env(&[
            ("DITTO_BASE", "https://ditto.example.com/"),
            ("DITTO_AUTH_TOKEN", "abc123"),
            ("DITTO_TIMEOUT", "30"),
        ]));
        assert_eq!(cfg.base(), "https://ditto.example.com");
        assert_eq!(cfg.authorization(), "Basic abc123");
        assert_eq!(cfg.timeout_seconds, 30);
    }

    #[test]
    fn test_invalid_timeout_keeps_default() {
        let mut cfg = SourceConfig::default();
        cfg.apply_env(env(&[("DITTO_TIMEOUT", "soon")]));
        assert_eq!(cfg.timeout_seconds, 10);
    }

    #[test]
    fn test_username_password_credential() {
        let mut cfg = SourceConfig::default();
        cfg.apply_env(env(&[("DITTO_USERNAME", "ditto"), ("DITTO_PASSWORD", "ditto")]));
        assert_eq!(cfg.authorization(), "Basic ZGl0dG86ZGl0dG8=");

        // An explicit token takes precedence
        cfg.auth_token = "tok".to_string();
        assert_eq!(cfg.authorization(), "Basic tok");
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let mut cfg = SourceConfig::default();
        cfg.auth_token = "secret-token".to_string();
        cfg.password = Some("hunter2".to_string());
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("secret-token"));
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("localhost:8080"));
    }

    #[test]
    fn test_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [source]
            base_url = "http://ditto:8080"
            auth_token = "xyz"
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.source.base_url, "http://ditto:8080");
        assert_eq!(config.source.auth_token, "xyz");
        assert_eq!(config.source.timeout_seconds, 10); // Default
    }

    #[test]
    fn test_empty_config_file_uses_defaults() {
        let config: ThingmapConfig = toml::from_str("").unwrap();
        assert_eq!(config.source.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config("/nonexistent/thingmap.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_malformed_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[source\nbase_url = ").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
