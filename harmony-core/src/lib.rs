//! Harmony Core - Shared Vocabulary
//!
//! Types every other Harmony crate speaks: the error taxonomy, query
//! selectors, repository operation policies, the Vastra validation chain,
//! mappers, the logging seam and configuration. No I/O and no threading
//! live here.

mod config;
mod error;
mod logger;
mod mapper;
mod operation;
mod query;
pub mod vastra;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::{ExecutorConfig, HarmonyConfig, RetryConfig, TimedCacheConfig, ValidationConfig};
pub use error::{
    ConfigError, DataError, HarmonyError, HarmonyResult, OperationError, TransportError,
};
pub use logger::{LogLevel, Logger, TracingLogger, VoidLogger};
pub use mapper::{ComposedMapper, DecodingMapper, EncodingMapper, FailingMapper, IdentityMapper, Mapper};
pub use operation::{Fallback, Operation, RepositoryMethod};
pub use query::{CustomQuery, Query};
pub use vastra::{
    DefaultObjectValidation, ObjectValidation, ReachabilityStrategy, Time, TimestampStrategy,
    Timestamped, ValidationResult, ValidationService, ValidationStrategy,
};
