//! Timestamp-based freshness.
//!
//! A cached object is fresh while the time elapsed since its last update is
//! below an expiry. Objects opt in by implementing [`Timestamped`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::strategy::{ValidationResult, ValidationStrategy};

/// Expiry interval for timestamped objects.
///
/// Serialized as a single-key table, e.g. `{ minutes = 5 }` in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Time {
    Seconds(u64),
    Minutes(u64),
    Hours(u64),
    Days(u64),
    Weeks(u64),
    /// Objects never become fresh; every read forces a refresh.
    Never,
}

impl Time {
    /// Length of the interval, or `None` for [`Time::Never`].
    pub fn as_duration(&self) -> Option<Duration> {
        let secs = match *self {
            Self::Seconds(n) => n,
            Self::Minutes(n) => n.saturating_mul(60),
            Self::Hours(n) => n.saturating_mul(60 * 60),
            Self::Days(n) => n.saturating_mul(24 * 60 * 60),
            Self::Weeks(n) => n.saturating_mul(7 * 24 * 60 * 60),
            Self::Never => return None,
        };
        Some(Duration::from_secs(secs))
    }

    /// True for a finite interval of zero length.
    pub fn is_zero(&self) -> bool {
        self.as_duration() == Some(Duration::ZERO)
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::Minutes(5)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(n) => write!(f, "{n}s"),
            Self::Minutes(n) => write!(f, "{n}m"),
            Self::Hours(n) => write!(f, "{n}h"),
            Self::Days(n) => write!(f, "{n}d"),
            Self::Weeks(n) => write!(f, "{n}w"),
            Self::Never => write!(f, "never"),
        }
    }
}

/// An object carrying the time it was last refreshed.
pub trait Timestamped {
    /// When the object was last updated, or `None` if unknown.
    fn last_update(&self) -> Option<DateTime<Utc>>;

    /// Per-object expiry overriding the strategy's.
    fn expiry(&self) -> Option<Time> {
        None
    }
}

impl<T: Timestamped> Timestamped for Arc<T> {
    fn last_update(&self) -> Option<DateTime<Utc>> {
        (**self).last_update()
    }

    fn expiry(&self) -> Option<Time> {
        (**self).expiry()
    }
}

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Decides freshness from the object's last update time.
///
/// - no timestamp: `Unknown`
/// - expiry [`Time::Never`]: `Invalid`
/// - elapsed below expiry: `Valid`, otherwise `Invalid`
///
/// A timestamp in the future counts as zero elapsed time.
#[derive(Clone)]
pub struct TimestampStrategy {
    expiry: Time,
    clock: Clock,
}

impl TimestampStrategy {
    pub fn new(expiry: Time) -> Self {
        Self {
            expiry,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, mostly for tests.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn expiry(&self) -> Time {
        self.expiry
    }

    fn elapsed_since(&self, last_update: DateTime<Utc>) -> Duration {
        let now = (self.clock)();
        if now > last_update {
            (now - last_update).to_std().unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        }
    }
}

impl fmt::Debug for TimestampStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimestampStrategy")
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl<T: Timestamped> ValidationStrategy<T> for TimestampStrategy {
    fn validate(&self, object: &T) -> ValidationResult {
        let Some(last_update) = object.last_update() else {
            return ValidationResult::Unknown;
        };

        let expiry = object.expiry().unwrap_or(self.expiry);
        let Some(expiry) = expiry.as_duration() else {
            return ValidationResult::Invalid;
        };

        if self.elapsed_since(last_update) < expiry {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid
        }
    }
}
