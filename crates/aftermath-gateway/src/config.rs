//! Gateway configuration
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or none) is a valid configuration. Command-line flags override file
//! values in `main`.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parse but cannot work together
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Directory holding all temporary artifacts
    pub storage_root: PathBuf,
    /// Largest accepted multipart form, in bytes
    pub max_upload_bytes: u64,
    /// Retention of unfetched results in seconds; 0 keeps them until fetched
    pub result_ttl_secs: u64,
    /// Seconds between retention sweeps
    pub sweep_interval_secs: u64,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
    /// External analyzer program
    pub analyzer: AnalyzerConfig,
}

impl GatewayConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Read` if the file cannot be read
    /// - `ConfigError::Parse` on malformed TOML or unknown keys
    /// - `ConfigError::Invalid` if values are inconsistent
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Same as [`GatewayConfig::load`], minus I/O.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot work
    ///
    /// # Errors
    /// - `ConfigError::Invalid` describing the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("max_upload_bytes must be positive".to_string()));
        }
        if self.result_ttl_secs > 0 && self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be positive when result_ttl_secs is set".to_string(),
            ));
        }
        if self.analyzer.timeout_secs == 0 {
            return Err(ConfigError::Invalid("analyzer.timeout_secs must be positive".to_string()));
        }
        for origin in &self.cors_origins {
            let valid = origin
                .parse::<warp::http::Uri>()
                .map(|uri| {
                    uri.scheme().is_some()
                        && uri.authority().is_some()
                        && matches!(uri.path(), "" | "/")
                        && uri.query().is_none()
                })
                .unwrap_or(false);
            if !valid {
                return Err(ConfigError::Invalid(format!("invalid CORS origin: {origin}")));
            }
        }
        Ok(())
    }

    /// With listen address
    #[inline]
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// With storage root
    #[inline]
    #[must_use]
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    /// With upload limit
    #[inline]
    #[must_use]
    pub fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// With result retention window
    #[inline]
    #[must_use]
    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl_secs = ttl.as_secs();
        self
    }

    /// Retention window, `None` when disabled
    #[inline]
    #[must_use]
    pub fn result_ttl(&self) -> Option<Duration> {
        (self.result_ttl_secs > 0).then(|| Duration::from_secs(self.result_ttl_secs))
    }

    /// Sweep interval
    #[inline]
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            storage_root: PathBuf::from("temp_uploads"),
            max_upload_bytes: 32 * 1024 * 1024,
            result_ttl_secs: 900,
            sweep_interval_secs: 60,
            cors_origins: Vec::new(),
            analyzer: AnalyzerConfig::default(),
        }
    }
}

/// External analyzer program settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Program to run
    pub program: PathBuf,
    /// Arguments placed before the operation name
    pub args: Vec<String>,
    /// Per-invocation limit in seconds
    pub timeout_secs: u64,
}

impl AnalyzerConfig {
    /// Per-invocation limit
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("aftermath-analyzer"),
            args: Vec::new(),
            timeout_secs: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(GatewayConfig::from_toml("").unwrap(), GatewayConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = GatewayConfig::from_toml(
            r#"
            bind = "0.0.0.0:8080"
            storage_root = "/var/lib/aftermath"
            result_ttl_secs = 0

            [analyzer]
            program = "python3"
            args = ["-m", "analyzer"]
            "#,
        )
        .unwrap();

        assert_eq!(config.bind, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.storage_root, PathBuf::from("/var/lib/aftermath"));
        assert_eq!(config.result_ttl(), None);
        assert_eq!(config.analyzer.args, vec!["-m".to_string(), "analyzer".to_string()]);
        assert_eq!(config.analyzer.timeout(), Duration::from_secs(120));
        assert_eq!(config.max_upload_bytes, 32 * 1024 * 1024);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = GatewayConfig::from_toml("upload_folder = \"x\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn inconsistent_values_are_rejected() {
        let err = GatewayConfig::from_toml("max_upload_bytes = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = GatewayConfig::from_toml("sweep_interval_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        assert!(GatewayConfig::from_toml("sweep_interval_secs = 0\nresult_ttl_secs = 0").is_ok());
    }

    #[test]
    fn cors_origins_must_be_bare_origins() {
        assert!(GatewayConfig::from_toml(r#"cors_origins = ["https://example.org"]"#).is_ok());
        for bad in ["example.org", "https://example.org/app", "*"] {
            let text = format!("cors_origins = [\"{bad}\"]");
            assert!(
                matches!(GatewayConfig::from_toml(&text), Err(ConfigError::Invalid(_))),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn builder_overrides() {
        let config = GatewayConfig::new()
            .with_storage_root("/tmp/x")
            .with_max_upload_bytes(1024)
            .with_result_ttl(Duration::from_secs(30));
        assert_eq!(config.storage_root, PathBuf::from("/tmp/x"));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.result_ttl(), Some(Duration::from_secs(30)));
    }
}
