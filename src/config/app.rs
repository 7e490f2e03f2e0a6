//! Main application configuration
//!
//! This module defines the primary configuration structures for the elo-ledger
//! service, including environment variable and TOML loading and validation.

use crate::config::rating::RatingConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub rating: RatingConfig,
    pub retry: RetrySettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Backoff applied when a rating commit hits a concurrent writer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds
    pub initial_backoff_ms: u64,
    /// Upper bound for the doubled delay in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "elo-ledger".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 50,
            max_backoff_ms: 2000,
        }
    }
}

impl RetrySettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }

        // Rating settings
        if let Ok(starting) = env::var("STARTING_RATING") {
            config.rating.starting_rating = starting
                .parse()
                .map_err(|_| anyhow!("Invalid STARTING_RATING value: {}", starting))?;
        }
        if let Ok(k_factor) = env::var("K_FACTOR") {
            config.rating.k_factor = k_factor
                .parse()
                .map_err(|_| anyhow!("Invalid K_FACTOR value: {}", k_factor))?;
        }
        if let Ok(category) = env::var("DEFAULT_CATEGORY") {
            config.rating.default_category = category;
        }

        // Retry settings
        if let Ok(attempts) = env::var("RETRY_MAX_ATTEMPTS") {
            config.retry.max_attempts = attempts
                .parse()
                .map_err(|_| anyhow!("Invalid RETRY_MAX_ATTEMPTS value: {}", attempts))?;
        }
        if let Ok(backoff) = env::var("RETRY_INITIAL_BACKOFF_MS") {
            config.retry.initial_backoff_ms = backoff
                .parse()
                .map_err(|_| anyhow!("Invalid RETRY_INITIAL_BACKOFF_MS value: {}", backoff))?;
        }
        if let Ok(backoff) = env::var("RETRY_MAX_BACKOFF_MS") {
            config.retry.max_backoff_ms = backoff
                .parse()
                .map_err(|_| anyhow!("Invalid RETRY_MAX_BACKOFF_MS value: {}", backoff))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        validate_config(&config)?;
        Ok(config)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate rating settings
    if !config.rating.k_factor.is_finite() || config.rating.k_factor <= 0.0 {
        return Err(anyhow!("K-factor must be a positive number"));
    }
    if !config.rating.starting_rating.is_finite() || config.rating.starting_rating <= 0.0 {
        return Err(anyhow!("Starting rating must be a positive number"));
    }
    if config.rating.default_category.trim().is_empty() {
        return Err(anyhow!("Default category cannot be empty"));
    }

    // Validate retry settings
    if config.retry.max_attempts == 0 {
        return Err(anyhow!("Retry max attempts must be greater than 0"));
    }
    if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
        return Err(anyhow!(
            "Initial backoff ({}ms) cannot exceed max backoff ({}ms)",
            config.retry.initial_backoff_ms,
            config.retry.max_backoff_ms
        ));
    }

    Ok(())
}
