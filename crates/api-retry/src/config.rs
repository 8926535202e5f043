use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config_env::EnvReader;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_INITIAL_DELAY_MS: u64 = 500;
const DEFAULT_MAX_DELAY_MS: u64 = 10_000;
const DEFAULT_FACTOR: f64 = 2.0;
const DEFAULT_JITTER: bool = true;
const DEFAULT_BATCH_CONCURRENCY: usize = 5;

/// Backoff settings shared by single calls and batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    /// Ceiling applied to every computed delay before jitter.
    pub max_delay_ms: u64,
    pub factor: f64,
    /// Adds up to 50% of the computed delay, chosen at random.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            factor: DEFAULT_FACTOR,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl RetryConfig {
    /// Reads `API_RETRY_*` variables; unset or blank ones keep their defaults.
    pub fn from_env() -> Result<Self, RetryConfigError> {
        Self::from_lookup(|key: &str| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RetryConfigError> {
        let config = Self::read(&EnvReader::new(lookup))?;
        config.validate()?;
        Ok(config)
    }

    fn read<L>(reader: &EnvReader<L>) -> Result<Self, RetryConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            max_retries: reader.integer("API_RETRY_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            initial_delay_ms: reader
                .integer("API_RETRY_INITIAL_DELAY_MS", DEFAULT_INITIAL_DELAY_MS)?,
            max_delay_ms: reader.integer("API_RETRY_MAX_DELAY_MS", DEFAULT_MAX_DELAY_MS)?,
            factor: reader.float("API_RETRY_FACTOR", DEFAULT_FACTOR)?,
            jitter: reader.flag("API_RETRY_JITTER", DEFAULT_JITTER)?,
        })
    }

    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if !self.factor.is_finite() || self.factor <= 0.0 {
            return Err(RetryConfigError::InvalidConfiguration(
                "API_RETRY_FACTOR must be a positive finite number".to_string(),
            ));
        }
        Ok(())
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Total attempts a call may make, counting the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(flatten)]
    pub retry: RetryConfig,
    /// Chunk size: how many items run at once.
    #[serde(default = "default_batch_concurrency")]
    pub concurrency: usize,
}

fn default_batch_concurrency() -> usize {
    DEFAULT_BATCH_CONCURRENCY
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

impl BatchConfig {
    /// [`RetryConfig::from_env`] plus `API_RETRY_BATCH_CONCURRENCY`.
    pub fn from_env() -> Result<Self, RetryConfigError> {
        Self::from_lookup(|key: &str| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RetryConfigError> {
        let reader = EnvReader::new(lookup);
        let config = Self {
            retry: RetryConfig::read(&reader)?,
            concurrency: reader.integer("API_RETRY_BATCH_CONCURRENCY", DEFAULT_BATCH_CONCURRENCY)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RetryConfigError> {
        self.retry.validate()?;
        if self.concurrency == 0 {
            return Err(RetryConfigError::InvalidConfiguration(
                "API_RETRY_BATCH_CONCURRENCY must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RetryConfigError {
    #[error("invalid integer in env var {key}: {value}")]
    ParseInt { key: String, value: String },
    #[error("invalid float in env var {key}: {value}")]
    ParseFloat { key: String, value: String },
    #[error("invalid boolean in env var {key}: {value}")]
    ParseBool { key: String, value: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
