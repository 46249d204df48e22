//! Network reachability strategy.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::strategy::{ValidationResult, ValidationStrategy};

/// Reports whether the network (or whatever backs the main data source) can
/// currently be reached.
pub trait Reachability: Send + Sync {
    fn is_reachable(&self) -> bool;
}

impl<F> Reachability for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_reachable(&self) -> bool {
        self()
    }
}

/// Shared, settable reachability state.
///
/// Clones observe the same flag, so a network monitor can own one handle and
/// the strategy another.
#[derive(Debug, Clone)]
pub struct ReachabilityFlag(Arc<AtomicBool>);

impl ReachabilityFlag {
    pub fn new(reachable: bool) -> Self {
        Self(Arc::new(AtomicBool::new(reachable)))
    }

    pub fn set(&self, reachable: bool) {
        self.0.store(reachable, Ordering::Release);
    }
}

impl Default for ReachabilityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Reachability for ReachabilityFlag {
    fn is_reachable(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Trusts cached data while offline.
///
/// Unreachable yields `Valid`; reachable yields `Unknown` so later strategies
/// decide.
pub struct ReachabilityStrategy {
    reachability: Arc<dyn Reachability>,
}

impl ReachabilityStrategy {
    pub fn new<R>(reachability: R) -> Self
    where
        R: Reachability + 'static,
    {
        Self {
            reachability: Arc::new(reachability),
        }
    }
}

impl fmt::Debug for ReachabilityStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReachabilityStrategy")
            .field("reachable", &self.reachability.is_reachable())
            .finish()
    }
}

impl<T> ValidationStrategy<T> for ReachabilityStrategy {
    fn validate(&self, _object: &T) -> ValidationResult {
        if self.reachability.is_reachable() {
            ValidationResult::Unknown
        } else {
            ValidationResult::Valid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_trusts_cache() {
        let flag = ReachabilityFlag::new(false);
        let strategy = ReachabilityStrategy::new(flag.clone());
        assert_eq!(strategy.validate(&()), ValidationResult::Valid);

        flag.set(true);
        assert_eq!(strategy.validate(&()), ValidationResult::Unknown);
    }

    #[test]
    fn test_closure_reachability() {
        let strategy = ReachabilityStrategy::new(|| false);
        assert_eq!(strategy.validate(&"cached"), ValidationResult::Valid);
    }
}
