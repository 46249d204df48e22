//! Strategy and validation traits.

/// Verdict of a single validation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationResult {
    /// The object may be served.
    Valid,
    /// The object must be refreshed.
    Invalid,
    /// The strategy has no opinion; defer to the next one.
    Unknown,
}

impl ValidationResult {
    /// Returns the decision, or `None` for `Unknown`.
    pub fn decision(self) -> Option<bool> {
        match self {
            Self::Valid => Some(true),
            Self::Invalid => Some(false),
            Self::Unknown => None,
        }
    }

    pub fn is_decisive(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// A single rule deciding whether an object is still fresh.
///
/// Strategies hold their own configuration (an expiry, a reachability probe)
/// but no state about the chain they belong to.
pub trait ValidationStrategy<T>: Send + Sync {
    fn validate(&self, object: &T) -> ValidationResult;
}

impl<T, F> ValidationStrategy<T> for F
where
    F: Fn(&T) -> ValidationResult + Send + Sync,
{
    fn validate(&self, object: &T) -> ValidationResult {
        self(object)
    }
}

/// Boolean validity predicate used by repositories and validating data sources.
pub trait ObjectValidation<T>: Send + Sync {
    /// Validates a single object.
    fn is_object_valid(&self, object: &T) -> bool;

    /// Validates an array of objects.
    ///
    /// An empty array is never valid: it means there is no cached data. A
    /// non-empty array is valid only when every element is.
    fn is_array_valid(&self, objects: &[T]) -> bool {
        !objects.is_empty() && objects.iter().all(|object| self.is_object_valid(object))
    }
}

/// Accepts every object.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultObjectValidation;

impl<T> ObjectValidation<T> for DefaultObjectValidation {
    fn is_object_valid(&self, _object: &T) -> bool {
        true
    }
}
