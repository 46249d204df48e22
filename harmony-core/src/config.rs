//! Configuration types

use crate::vastra::{Time, TimestampStrategy, Timestamped, ValidationService};
use crate::{ConfigError, HarmonyError, HarmonyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Defaults for the Vastra validation chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Verdict when no strategy decides.
    pub default_valid: bool,
    /// Expiry used by the timestamp strategy.
    pub expiry: Time,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            default_valid: false,
            expiry: Time::Seconds(300),
        }
    }
}

/// In-process expiry layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimedCacheConfig {
    pub expiry_secs: u64,
}

impl Default for TimedCacheConfig {
    fn default() -> Self {
        Self { expiry_secs: 300 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Prefix for generated executor names, followed by a counter.
    pub name_prefix: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name_prefix: "harmony.executor".to_string(),
        }
    }
}

/// Master configuration struct.
///
/// Every section may be omitted from TOML; missing sections take their
/// defaults.
///
/// ```toml
/// [validation]
/// default_valid = false
/// expiry = { minutes = 5 }
///
/// [timed_cache]
/// expiry_secs = 300
///
/// [retry]
/// max_retries = 3
///
/// [executor]
/// name_prefix = "harmony.executor"
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonyConfig {
    pub validation: ValidationConfig,
    pub timed_cache: TimedCacheConfig,
    pub retry: RetryConfig,
    pub executor: ExecutorConfig,
}

impl HarmonyConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(input: &str) -> HarmonyResult<Self> {
        let config: Self = toml::from_str(input).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> HarmonyResult<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| {
            HarmonyError::Config(ConfigError::Parse {
                reason: format!("{}: {}", path.display(), e),
            })
        })?;
        Self::from_toml_str(&input)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - validation.expiry is not zero
    /// - timed_cache.expiry_secs > 0
    /// - retry.max_retries > 0
    /// - executor.name_prefix is not empty
    pub fn validate(&self) -> HarmonyResult<()> {
        if self.validation.expiry.is_zero() {
            return Err(HarmonyError::Config(ConfigError::InvalidValue {
                field: "validation.expiry".to_string(),
                value: self.validation.expiry.to_string(),
                reason: "expiry must be positive".to_string(),
            }));
        }

        if self.timed_cache.expiry_secs == 0 {
            return Err(HarmonyError::Config(ConfigError::InvalidValue {
                field: "timed_cache.expiry_secs".to_string(),
                value: self.timed_cache.expiry_secs.to_string(),
                reason: "expiry_secs must be greater than 0".to_string(),
            }));
        }

        if self.retry.max_retries == 0 {
            return Err(HarmonyError::Config(ConfigError::InvalidValue {
                field: "retry.max_retries".to_string(),
                value: self.retry.max_retries.to_string(),
                reason: "max_retries must be greater than 0".to_string(),
            }));
        }

        if self.executor.name_prefix.trim().is_empty() {
            return Err(HarmonyError::Config(ConfigError::MissingRequired {
                field: "executor.name_prefix".to_string(),
            }));
        }

        Ok(())
    }

    pub fn timed_cache_expiry(&self) -> Duration {
        Duration::from_secs(self.timed_cache.expiry_secs)
    }

    /// A validation service with a single timestamp strategy using the
    /// configured expiry and default verdict.
    pub fn validation_service<T>(&self) -> ValidationService<T>
    where
        T: Timestamped + 'static,
    {
        ValidationService::new(self.validation.default_valid)
            .with_strategy(TimestampStrategy::new(self.validation.expiry))
    }
}
