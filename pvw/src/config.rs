//! pvw configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable consulted when no account name is configured
pub const ACCOUNT_NAME_ENV: &str = "PURVIEW_ACCOUNT_NAME";

/// Main pvw configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Purview account and transport settings
    pub purview: PurviewConfig,

    /// Batch processing defaults
    pub batch: BatchConfig,

    /// Retry policy for throttled or transient failures
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for path in Self::default_paths().iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Follows the same lookup as `load`. Errors are swallowed; the full load
    /// reports them once logging is up.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::default_paths(),
        };

        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    /// Config files tried in order when no path is given: project-local
    /// `.pvw.yml`, then `<config_dir>/pvw/pvw.yml`
    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".pvw.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("pvw").join("pvw.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Purview account configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PurviewConfig {
    /// Purview account name; the endpoint is derived from it
    #[serde(rename = "account-name")]
    pub account_name: Option<String>,

    /// Explicit endpoint, overrides the account-derived one
    pub endpoint: Option<String>,

    /// Environment variable holding a bearer token for the Data Map API
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// Per-call timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for PurviewConfig {
    fn default() -> Self {
        Self {
            account_name: None,
            endpoint: None,
            token_env: "PURVIEW_TOKEN".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Purview settings with the endpoint and token looked up
#[derive(Clone)]
pub struct ResolvedPurviewConfig {
    pub endpoint: String,
    pub token: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ResolvedPurviewConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedPurviewConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PurviewConfig {
    /// Endpoint from explicit config, then account name, then `PURVIEW_ACCOUNT_NAME`
    pub fn endpoint(&self) -> Result<String> {
        if let Some(endpoint) = &self.endpoint {
            debug!(%endpoint, "PurviewConfig::endpoint: explicit endpoint");
            return Ok(endpoint.trim_end_matches('/').to_string());
        }

        let account = self
            .account_name
            .clone()
            .or_else(|| std::env::var(ACCOUNT_NAME_ENV).ok())
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| {
                eyre::eyre!(
                    "Purview account not configured. Set purview.account-name or the {} environment variable.",
                    ACCOUNT_NAME_ENV
                )
            })?;

        Ok(format!("https://{}.purview.azure.com", account.trim()))
    }

    /// Resolve endpoint and token, failing fast with a clear message
    pub fn resolve(&self) -> Result<ResolvedPurviewConfig> {
        let endpoint = self.endpoint()?;
        let token = std::env::var(&self.token_env).map_err(|_| {
            eyre::eyre!(
                "Purview token not found. Set the {} environment variable.",
                self.token_env
            )
        })?;

        Ok(ResolvedPurviewConfig {
            endpoint,
            token,
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}

/// Batch processing defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Rows per batch
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Maximum rows in flight within a batch
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: crate::DEFAULT_BATCH_SIZE,
            concurrency: crate::DEFAULT_CONCURRENCY,
        }
    }
}

/// Retry policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call, including the first
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(rename = "initial-backoff-ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for any single delay
    #[serde(rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,

    /// Randomize delays to spread out retries
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            jitter: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.purview.token_env, "PURVIEW_TOKEN");
        assert_eq!(config.batch.batch_size, crate::DEFAULT_BATCH_SIZE);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.retry.jitter);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

purview:
  account-name: contoso
  token-env: MY_TOKEN
  timeout-ms: 5000

batch:
  batch-size: 10
  concurrency: 2

retry:
  max-attempts: 5
  initial-backoff-ms: 250
  max-backoff-ms: 4000
  jitter: false
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.purview.account_name.as_deref(), Some("contoso"));
        assert_eq!(config.purview.token_env, "MY_TOKEN");
        assert_eq!(config.purview.timeout_ms, 5000);
        assert_eq!(config.batch.batch_size, 10);
        assert_eq!(config.batch.concurrency, 2);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 250);
        assert!(!config.retry.jitter);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
batch:
  batch-size: 7
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.batch.batch_size, 7);
        assert_eq!(config.batch.concurrency, crate::DEFAULT_CONCURRENCY);
        assert_eq!(config.purview.timeout_ms, 30_000);
        assert_eq!(config.retry.max_backoff_ms, 30_000);
    }

    #[test]
    fn test_endpoint_from_account_name() {
        let config = PurviewConfig {
            account_name: Some("contoso".to_string()),
            ..Default::default()
        };
        assert_eq!(config.endpoint().unwrap(), "https://contoso.purview.azure.com");
    }

    #[test]
    fn test_explicit_endpoint_wins() {
        let config = PurviewConfig {
            account_name: Some("contoso".to_string()),
            endpoint: Some("http://localhost:8080/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.endpoint().unwrap(), "http://localhost:8080");
    }

    #[test]
    fn test_resolve_requires_token() {
        let config = PurviewConfig {
            account_name: Some("contoso".to_string()),
            token_env: "PVW_TEST_TOKEN_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        let err = config.resolve().unwrap_err();
        assert!(err.to_string().contains("PVW_TEST_TOKEN_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("pvw.yml");
        fs::write(&path, "log-level: warn\nbatch:\n  concurrency: 9\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.batch.concurrency, 9);
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("warn"));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let path = PathBuf::from("/nonexistent/pvw.yml");
        assert!(Config::load(Some(&path)).is_err());
        assert_eq!(Config::load_log_level(Some(&path)), None);
    }

    #[test]
    fn test_default_paths_order() {
        let paths = Config::default_paths();
        assert_eq!(paths[0], PathBuf::from(".pvw.yml"));
        if let Some(config_dir) = dirs::config_dir() {
            assert_eq!(paths[1], config_dir.join("pvw").join("pvw.yml"));
        }
    }

    #[test]
    fn test_log_level_from_unparseable_file_is_none() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("pvw.yml");
        fs::write(&path, "log-level: [unterminated\n").unwrap();

        assert_eq!(Config::load_log_level(Some(&path)), None);
        assert!(Config::load(Some(&path)).is_err());
    }
}
