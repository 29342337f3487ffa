//! # Warden Config - Configuration Management
//!
//! Handles configuration loading from files and environment variables.

use std::path::Path;

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Top-level Warden configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Authentication configuration: key set fetching and token verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// URL of the identity provider's key-distribution endpoint
    #[serde(default)]
    pub jwks_url: String,

    /// Issuer expected in every verified token (exact match)
    #[serde(default)]
    pub expected_issuer: String,

    /// Audience expected in verified tokens (not enforced when unset)
    pub expected_audience: Option<String>,

    /// Accepted signature algorithms
    #[serde(default = "default_accepted_algorithms")]
    pub accepted_algorithms: Vec<String>,

    /// Maximum age of a cached key set before a refresh is attempted
    #[serde(default = "default_keyset_max_age")]
    pub keyset_max_age_seconds: u64,

    /// Minimum delay between key set fetch attempts, even after failure
    #[serde(default = "default_keyset_cooldown")]
    pub keyset_cooldown_seconds: u64,

    /// Timeout for a single key set fetch
    #[serde(default = "default_keyset_fetch_timeout")]
    pub keyset_fetch_timeout_ms: u64,

    /// Maximum verification attempts (first attempt included)
    #[serde(default = "default_verify_max_attempts")]
    pub verify_max_attempts: u32,

    /// Base delay for linear retry backoff
    #[serde(default = "default_verify_backoff_base")]
    pub verify_backoff_base_ms: u64,

    /// Deadline for a single verification attempt
    #[serde(default = "default_verify_attempt_timeout")]
    pub verify_attempt_timeout_ms: u64,

    /// Tolerated clock skew when validating time claims
    #[serde(default = "default_clock_skew")]
    pub clock_skew_seconds: u64,

    /// Maximum accepted token age (issued-at based)
    #[serde(default = "default_max_token_age")]
    pub max_token_age_seconds: u64,
}

fn default_accepted_algorithms() -> Vec<String> {
    vec!["EdDSA".to_string(), "RS256".to_string()]
}

fn default_keyset_max_age() -> u64 {
    3600
}

fn default_keyset_cooldown() -> u64 {
    30
}

fn default_keyset_fetch_timeout() -> u64 {
    5000
}

fn default_verify_max_attempts() -> u32 {
    2
}

fn default_verify_backoff_base() -> u64 {
    500
}

fn default_verify_attempt_timeout() -> u64 {
    8000
}

fn default_clock_skew() -> u64 {
    60
}

fn default_max_token_age() -> u64 {
    86400
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwks_url: String::new(),
            expected_issuer: String::new(),
            expected_audience: None,
            accepted_algorithms: default_accepted_algorithms(),
            keyset_max_age_seconds: default_keyset_max_age(),
            keyset_cooldown_seconds: default_keyset_cooldown(),
            keyset_fetch_timeout_ms: default_keyset_fetch_timeout(),
            verify_max_attempts: default_verify_max_attempts(),
            verify_backoff_base_ms: default_verify_backoff_base(),
            verify_attempt_timeout_ms: default_verify_attempt_timeout(),
            clock_skew_seconds: default_clock_skew(),
            max_token_age_seconds: default_max_token_age(),
        }
    }
}

/// Metadata cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live for cached principal metadata
    #[serde(default = "default_metadata_ttl")]
    pub metadata_ttl_seconds: u64,

    /// Interval between background sweeps of stale entries
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_metadata_ttl() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            metadata_ttl_seconds: default_metadata_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl Config {
    /// Load configuration from an optional file plus `WARDEN__*` environment
    /// variables (e.g. `WARDEN__AUTH__JWKS_URL`)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(Environment::with_prefix("WARDEN").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// Validate the loaded configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwks_url.is_empty() {
            return Err(ConfigError::Message("auth.jwks_url must be set".into()));
        }
        if !self.auth.jwks_url.starts_with("http://") && !self.auth.jwks_url.starts_with("https://")
        {
            return Err(ConfigError::Message(
                "auth.jwks_url must be an http(s) URL".into(),
            ));
        }
        if self.auth.expected_issuer.is_empty() {
            return Err(ConfigError::Message(
                "auth.expected_issuer must be set".into(),
            ));
        }
        if self.auth.accepted_algorithms.is_empty() {
            return Err(ConfigError::Message(
                "auth.accepted_algorithms must not be empty".into(),
            ));
        }
        if self.auth.verify_max_attempts == 0 {
            return Err(ConfigError::Message(
                "auth.verify_max_attempts must be at least 1".into(),
            ));
        }
        if self.cache.metadata_ttl_seconds == 0 {
            return Err(ConfigError::Message(
                "cache.metadata_ttl_seconds must be greater than zero".into(),
            ));
        }
        if self.cache.sweep_interval_seconds == 0 {
            return Err(ConfigError::Message(
                "cache.sweep_interval_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            cache: CacheConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
