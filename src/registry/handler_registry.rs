//! In-process handler registration.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use crate::dispatcher::{EventHandler, HandlerDescriptor};
use crate::error::Result;
use crate::events::Filter;

/// Supplier of candidate handler descriptors.
///
/// Sources report every candidate they find, duplicates included; validation belongs to
/// the dispatcher.
#[async_trait]
pub trait HandlerSource: Send + Sync {
    async fn discover(&self) -> Result<Vec<HandlerDescriptor>>;
}

#[async_trait]
impl HandlerSource for Vec<HandlerDescriptor> {
    async fn discover(&self) -> Result<Vec<HandlerDescriptor>> {
        Ok(self.clone())
    }
}

/// Handlers registered programmatically, in registration order
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: RwLock<Vec<HandlerDescriptor>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        filter: Filter,
        handler: Arc<dyn EventHandler>,
    ) -> &Self {
        self.register_descriptor(HandlerDescriptor::new(name, filter, handler))
    }

    pub fn register_descriptor(&self, descriptor: HandlerDescriptor) -> &Self {
        debug!(handler = %descriptor.name, "Registered handler");
        self.handlers.write().push(descriptor);
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers
            .read()
            .iter()
            .map(|descriptor| descriptor.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

#[async_trait]
impl HandlerSource for HandlerRegistry {
    async fn discover(&self) -> Result<Vec<HandlerDescriptor>> {
        Ok(self.handlers.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::handler_fn;

    #[tokio::test]
    async fn test_discover_returns_registrations_in_order() {
        let registry = HandlerRegistry::new();
        let noop = handler_fn(|_| async { anyhow::Ok(()) });

        registry
            .register("zaps", Filter::new().kinds([9735]), noop.clone())
            .register("notes", Filter::new().kinds([1]), noop.clone())
            .register("zaps", Filter::new(), noop);

        let discovered = registry.discover().await.unwrap();
        let names: Vec<_> = discovered.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["zaps", "notes", "zaps"]);
        assert_eq!(registry.len(), 3);
        assert_eq!(discovered[0].filter.kinds, Some(vec![9735]));
    }
}
