use std::sync::Arc;

use crate::{backend::Backend, error::ConfigError};

/// Fixed, ordered, non-empty set of backends. Order is rotation order.
pub struct BackendPool {
    backends: Vec<Arc<dyn Backend>>,
}

impl BackendPool {
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Result<Self, ConfigError> {
        if backends.is_empty() {
            return Err(ConfigError::EmptyPool);
        }
        Ok(Self { backends })
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    // Always false once constructed.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn backend(&self, index: usize) -> Option<&Arc<dyn Backend>> {
        self.backends.get(index)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.backends
            .iter()
            .map(|b| b.address().to_string())
            .collect()
    }
}
