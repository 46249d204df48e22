//! Repository operation policies.
//!
//! An [`Operation`] tells a repository which of its data sources a call is
//! forwarded to, and in which order. Every repository method takes one
//! explicitly; [`Operation::Default`] is a named policy, not an absence of one.

use crate::HarmonyError;
use std::fmt;

/// Decides whether a failed main fetch may be answered with stale cache data.
#[derive(Debug, Clone, Copy, Default)]
pub enum Fallback {
    /// Always propagate the main data source error.
    #[default]
    Never,
    /// Always fall back to the stale cached value.
    Always,
    /// Fall back when the predicate accepts the main error.
    When(fn(&HarmonyError) -> bool),
}

impl Fallback {
    pub fn accepts(&self, error: &HarmonyError) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::When(predicate) => predicate(error),
        }
    }
}

/// Data routing policy for a repository call.
#[derive(Debug, Clone, Copy, Default)]
pub enum Operation {
    /// The repository's documented default. For a cache repository: reads
    /// behave as [`Operation::cache_sync`], writes as [`Operation::MainSync`].
    #[default]
    Default,
    /// Only the main data source.
    MainOnly,
    /// Main data source first, then mirror the result into the cache.
    /// Reads fall back to the cached value when main fails.
    MainSync,
    /// Only the cache data source.
    CacheOnly {
        /// Return cached values even when the validator rejects them.
        ignore_validation: bool,
    },
    /// Cache first; on a miss or an invalid value, refresh from main.
    CacheSync {
        /// Whether a failed refresh may return the stale cached value.
        fallback: Fallback,
    },
}

impl Operation {
    /// `CacheOnly` honouring the validator.
    pub const fn cache_only() -> Self {
        Self::CacheOnly {
            ignore_validation: false,
        }
    }

    /// `CacheSync` without stale fallback.
    pub const fn cache_sync() -> Self {
        Self::CacheSync {
            fallback: Fallback::Never,
        }
    }

    pub const fn cache_sync_with_fallback(fallback: Fallback) -> Self {
        Self::CacheSync { fallback }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::MainOnly => "MainOnly",
            Self::MainSync => "MainSync",
            Self::CacheOnly { .. } => "CacheOnly",
            Self::CacheSync { .. } => "CacheSync",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Repository CRUD method, used to report unsupported operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryMethod {
    Get,
    GetAll,
    Put,
    PutAll,
    Delete,
    DeleteAll,
}

impl RepositoryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::GetAll => "get_all",
            Self::Put => "put",
            Self::PutAll => "put_all",
            Self::Delete => "delete",
            Self::DeleteAll => "delete_all",
        }
    }
}

impl fmt::Display for RepositoryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
