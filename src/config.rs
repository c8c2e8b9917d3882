//! Client configuration
//!
//! Loaded from a TOML settings file. Every field has a built-in default,
//! so a missing file still yields a usable configuration pointed at the
//! Fedora hub. Secrets never live in the file: the hub password and the
//! TLS key passphrase come from the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::hub::TaskStateFilter;
use crate::tls::TlsFileConfig;

/// Environment variable supplying the hub password.
pub const PASSWORD_ENV: &str = "KOJI_SCOPE_PASSWORD";

/// Environment variable supplying the TLS key passphrase.
pub const KEY_PASSPHRASE_ENV: &str = "KOJI_SCOPE_KEY_PASSPHRASE";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Top-level settings, one section per concern
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub hub: HubConfig,
    pub builds: BuildsConfig,
    pub tasks: TasksConfig,
    pub tls: TlsFileConfig,
    pub http: HttpConfig,
}

/// Hub endpoints and identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// XML-RPC endpoint (default: the Fedora hub)
    pub hub_url: String,

    /// Web UI base, for build links (default: the Fedora web UI)
    pub web_url: String,

    /// File server base, for task log URLs (default: the Fedora file server)
    pub files_url: String,

    /// Username for password login; anonymous when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            hub_url: "https://koji.fedoraproject.org/kojihub".to_string(),
            web_url: "https://koji.fedoraproject.org/koji".to_string(),
            files_url: "https://koji.fedoraproject.org/kojifiles".to_string(),
            username: None,
        }
    }
}

/// Build listing options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildsConfig {
    /// Maximum records per listing (default: 20)
    pub limit: i64,
}

impl Default for BuildsConfig {
    fn default() -> Self {
        Self { limit: 20 }
    }
}

/// Task listing options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    /// Maximum records per listing (default: 50)
    pub limit: i64,

    /// Restrict listings to one owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// State filter name (default: "ALL")
    pub state: String,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            limit: 50,
            owner: None,
            state: "ALL".to_string(),
        }
    }
}

impl TasksConfig {
    /// Parsed state filter; `None` when the spelling is unknown.
    pub fn state_filter(&self) -> Option<TaskStateFilter> {
        TaskStateFilter::parse(&self.state)
    }
}

/// HTTP behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds; 0 disables the timeout (default: 60)
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_seconds: 60 }
    }
}

impl HttpConfig {
    /// Timeout as a duration, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

impl ScopeConfig {
    /// Load and validate a settings file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the user settings file, falling back to defaults when absent.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Default settings location (~/.config/koji-scope/config.toml).
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var("HOME").ok()?;
        Some(PathBuf::from(home).join(".config/koji-scope/config.toml"))
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.builds.limit <= 0 || self.builds.limit > 1000 {
            return Err(ConfigError::ValidationError(
                "builds.limit must be in (0, 1000]".to_string(),
            ));
        }

        if self.tasks.limit <= 0 || self.tasks.limit > 1000 {
            return Err(ConfigError::ValidationError(
                "tasks.limit must be in (0, 1000]".to_string(),
            ));
        }

        if self.http.timeout_seconds > 3600 {
            return Err(ConfigError::ValidationError(
                "http.timeout_seconds must be at most 3600 (0 disables)".to_string(),
            ));
        }

        if self.tasks.state_filter().is_none() {
            return Err(ConfigError::ValidationError(format!(
                "tasks.state must be one of ALL, FREE, OPEN, CLOSED, CANCELED, ASSIGNED, FAILED (got {:?})",
                self.tasks.state
            )));
        }

        Ok(())
    }

    /// TLS file configuration with the passphrase filled from the environment.
    pub fn tls_with_env_passphrase(&self) -> TlsFileConfig {
        let mut tls = self.tls.clone();
        tls.key_passphrase = env_secret(KEY_PASSPHRASE_ENV);
        tls
    }
}

/// Read the hub password from the environment.
pub fn env_password() -> Option<String> {
    env_secret(PASSWORD_ENV)
}

fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ScopeConfig::default();
        assert_eq!(config.hub.hub_url, "https://koji.fedoraproject.org/kojihub");
        assert_eq!(config.hub.web_url, "https://koji.fedoraproject.org/koji");
        assert_eq!(
            config.hub.files_url,
            "https://koji.fedoraproject.org/kojifiles"
        );
        assert_eq!(config.builds.limit, 20);
        assert_eq!(config.tasks.limit, 50);
        assert_eq!(config.tasks.state_filter(), Some(TaskStateFilter::All));
        assert!(config.tls.reject_unauthorized);
        assert_eq!(config.http.timeout(), Some(Duration::from_secs(60)));
        config.validate().unwrap();
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "[builds]").unwrap();
        writeln!(temp, "limit = 5").unwrap();

        let config = ScopeConfig::load(temp.path()).unwrap();
        assert_eq!(config.builds.limit, 5);
        assert_eq!(config.tasks.limit, 50);
        assert_eq!(config.hub.hub_url, "https://koji.fedoraproject.org/kojihub");
    }

    #[test]
    fn test_load_full_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "[hub]").unwrap();
        writeln!(temp, "hub_url = \"https://hub.internal/kojihub\"").unwrap();
        writeln!(temp, "username = \"builder\"").unwrap();
        writeln!(temp, "[tasks]").unwrap();
        writeln!(temp, "limit = 10").unwrap();
        writeln!(temp, "owner = \"builder\"").unwrap();
        writeln!(temp, "state = \"failed\"").unwrap();
        writeln!(temp, "[tls]").unwrap();
        writeln!(temp, "cert_file = \"/etc/pki/client.crt\"").unwrap();
        writeln!(temp, "key_file = \"/etc/pki/client.key\"").unwrap();
        writeln!(temp, "reject_unauthorized = false").unwrap();
        writeln!(temp, "[http]").unwrap();
        writeln!(temp, "timeout_seconds = 0").unwrap();

        let config = ScopeConfig::load(temp.path()).unwrap();
        assert_eq!(config.hub.hub_url, "https://hub.internal/kojihub");
        assert_eq!(config.hub.username.as_deref(), Some("builder"));
        assert_eq!(config.tasks.owner.as_deref(), Some("builder"));
        assert_eq!(config.tasks.state_filter(), Some(TaskStateFilter::Failed));
        assert_eq!(config.tls.cert_file.as_deref(), Some("/etc/pki/client.crt"));
        assert!(!config.tls.reject_unauthorized);
        assert_eq!(config.http.timeout(), None);
    }

    #[test]
    fn test_validation_builds_limit() {
        let mut config = ScopeConfig::default();
        config.builds.limit = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("builds.limit"));

        config.builds.limit = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_tasks_limit() {
        let mut config = ScopeConfig::default();
        config.tasks.limit = -1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tasks.limit"));
    }

    #[test]
    fn test_validation_timeout_upper_bound() {
        let mut config = ScopeConfig::default();
        config.http.timeout_seconds = 7200;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));

        config.http.timeout_seconds = 0;
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_unknown_state() {
        let mut config = ScopeConfig::default();
        config.tasks.state = "WEIRD".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tasks.state"));
    }

    #[test]
    fn test_parse_error() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "[builds").unwrap();

        let err = ScopeConfig::load(temp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ScopeConfig::load(Path::new("/nonexistent/koji-scope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_invalid_file_fails_load() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "[tasks]").unwrap();
        writeln!(temp, "limit = 0").unwrap();

        let err = ScopeConfig::load(temp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_default_path_under_home() {
        if let Some(path) = ScopeConfig::default_path() {
            assert!(path.ends_with(".config/koji-scope/config.toml"));
        }
    }
}
