//! Ledger configuration
//!
//! Loaded from TOML, validated, then optionally overridden by
//! `EXPENSEBOOK_*` environment variables.

use expensebook_core::{DocumentNumber, DEFAULT_ORGANIZATION_NAME};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "EXPENSEBOOK_";

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found
    #[error("config file not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Environment override could not be parsed
    #[error("invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },

    /// Validation error
    #[error("validation error: {0}")]
    Validation(String),
}

/// Tunables for the ledger services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Counter value of a fresh organization; the first number issued is floor + 1
    pub sequence_floor: i64,
    pub document_prefix: String,
    pub sequence_max_attempts: u32,
    pub payment_max_attempts: u32,
    /// Re-lookups after a concurrent sign-in of the same principal
    pub identity_max_attempts: u32,
    pub upload_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub default_organization_name: String,
    /// When false, only invited emails may join (except the very first user)
    pub open_signup: bool,
    pub max_proof_bytes: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            sequence_floor: 1000,
            document_prefix: DocumentNumber::DEFAULT_PREFIX.to_string(),
            sequence_max_attempts: 5,
            payment_max_attempts: 5,
            identity_max_attempts: 3,
            upload_timeout_ms: 30_000,
            write_timeout_ms: 10_000,
            default_organization_name: DEFAULT_ORGANIZATION_NAME.to_string(),
            open_signup: true,
            max_proof_bytes: 10 * 1024 * 1024,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from string
    pub fn load_str(content: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `EXPENSEBOOK_*` variables from the process environment
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(std::env::vars())
    }

    /// Apply overrides from `(KEY, value)` pairs. Unknown keys are ignored.
    pub fn with_overrides<I>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match field {
                "SEQUENCE_FLOOR" => self.sequence_floor = parse_var(&key, &value)?,
                "DOCUMENT_PREFIX" => self.document_prefix = value,
                "SEQUENCE_MAX_ATTEMPTS" => self.sequence_max_attempts = parse_var(&key, &value)?,
                "PAYMENT_MAX_ATTEMPTS" => self.payment_max_attempts = parse_var(&key, &value)?,
                "IDENTITY_MAX_ATTEMPTS" => self.identity_max_attempts = parse_var(&key, &value)?,
                "UPLOAD_TIMEOUT_MS" => self.upload_timeout_ms = parse_var(&key, &value)?,
                "WRITE_TIMEOUT_MS" => self.write_timeout_ms = parse_var(&key, &value)?,
                "DEFAULT_ORGANIZATION_NAME" => self.default_organization_name = value,
                "OPEN_SIGNUP" => self.open_signup = parse_var(&key, &value)?,
                "MAX_PROOF_BYTES" => self.max_proof_bytes = parse_var(&key, &value)?,
                _ => {}
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sequence_floor < 0 {
            return Err(ConfigError::Validation(format!(
                "sequence_floor must not be negative, got {}",
                self.sequence_floor
            )));
        }

        let prefix = self.document_prefix.as_str();
        if prefix.trim().is_empty()
            || prefix.trim() != prefix
            || prefix.ends_with(|c: char| c.is_ascii_digit())
        {
            return Err(ConfigError::Validation(format!(
                "document_prefix '{}' must be non-empty, without surrounding whitespace, and must not end with a digit",
                self.document_prefix
            )));
        }

        if self.sequence_max_attempts == 0
            || self.payment_max_attempts == 0
            || self.identity_max_attempts == 0
        {
            return Err(ConfigError::Validation(
                "retry attempts must be at least 1".to_string(),
            ));
        }

        if self.upload_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "timeouts must be greater than zero".to_string(),
            ));
        }

        if self.default_organization_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "default_organization_name must not be blank".to_string(),
            ));
        }

        if self.max_proof_bytes == 0 {
            return Err(ConfigError::Validation(
                "max_proof_bytes must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}
