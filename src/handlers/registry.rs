use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use super::traits::Handler;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("handler '{0}' declares no handles")]
    NoHandles(&'static str),
    #[error("handler '{0}' is already registered")]
    Duplicate(&'static str),
}

/// Registry of archive handlers, in registration order.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler declares no handles or a handler with
    /// the same name is already registered.
    pub fn register(&mut self, handler: Arc<dyn Handler>) -> Result<(), RegistryError> {
        if handler.handles().is_empty() {
            return Err(RegistryError::NoHandles(handler.name()));
        }
        if self.handlers.iter().any(|h| h.name() == handler.name()) {
            return Err(RegistryError::Duplicate(handler.name()));
        }
        self.handlers.push(handler);
        Ok(())
    }

    /// Get all registered handlers.
    #[must_use]
    pub fn handlers(&self) -> &[Arc<dyn Handler>] {
        &self.handlers
    }

    /// Every handle declared by any handler, sorted and deduplicated.
    #[must_use]
    pub fn handles(&self) -> Vec<&'static str> {
        self.handlers
            .iter()
            .flat_map(|h| h.handles().iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether at least one handler declares `handle`.
    #[must_use]
    pub fn knows(&self, handle: &str) -> bool {
        self.handlers.iter().any(|h| h.handles().contains(&handle))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.name()))
            .finish()
    }
}
