//! Vastra: object validation through an ordered chain of strategies.
//!
//! Cached data does not announce its own staleness. Repositories ask an
//! [`ObjectValidation`] whether a cached object may still be served, and the
//! usual implementation is a [`ValidationService`] that walks a list of
//! [`ValidationStrategy`] values in order:
//!
//! ```text
//! object ─▶ Reachability ─▶ Timestamp ─▶ ... ─▶ default
//!             │ Valid/Invalid  │ Valid/Invalid
//!             ▼                ▼
//!           decided          decided
//! ```
//!
//! The first strategy that returns `Valid` or `Invalid` decides. A chain where
//! every strategy answers `Unknown` yields the service's default.
//!
//! # Example
//!
//! ```ignore
//! let service = ValidationService::new(false)
//!     .with_strategy(ReachabilityStrategy::new(network_monitor))
//!     .with_strategy(TimestampStrategy::new(Time::Minutes(5)));
//!
//! if service.is_object_valid(&cached_user) { /* serve from cache */ }
//! ```

pub mod reachability;
pub mod service;
pub mod strategy;
pub mod timestamp;

pub use reachability::{Reachability, ReachabilityFlag, ReachabilityStrategy};
pub use service::ValidationService;
pub use strategy::{DefaultObjectValidation, ObjectValidation, ValidationResult, ValidationStrategy};
pub use timestamp::{Clock, Time, TimestampStrategy, Timestamped};
