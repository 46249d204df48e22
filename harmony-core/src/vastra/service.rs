//! Ordered strategy chain.

use std::fmt;

use super::strategy::{ObjectValidation, ValidationStrategy};

/// Runs strategies in insertion order; the first `Valid` or `Invalid` wins.
///
/// When no strategy decides, the service answers with `default_valid`.
pub struct ValidationService<T> {
    strategies: Vec<Box<dyn ValidationStrategy<T>>>,
    default_valid: bool,
}

impl<T> ValidationService<T> {
    pub fn new(default_valid: bool) -> Self {
        Self {
            strategies: Vec::new(),
            default_valid,
        }
    }

    /// Append a strategy to the end of the chain.
    pub fn with_strategy<S>(mut self, strategy: S) -> Self
    where
        S: ValidationStrategy<T> + 'static,
    {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn push(&mut self, strategy: Box<dyn ValidationStrategy<T>>) {
        self.strategies.push(strategy);
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn default_valid(&self) -> bool {
        self.default_valid
    }
}

impl<T> fmt::Debug for ValidationService<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationService")
            .field("strategies", &self.strategies.len())
            .field("default_valid", &self.default_valid)
            .finish()
    }
}

impl<T> ObjectValidation<T> for ValidationService<T> {
    fn is_object_valid(&self, object: &T) -> bool {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.validate(object).decision())
            .unwrap_or(self.default_valid)
    }
}
