//! Handler contract and descriptors consumed by the dispatcher.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::events::{Filter, NostrEvent};

/// Processes events delivered to one subscription.
///
/// Returning `Ok` advances the handler's checkpoint to the event's `created_at`. Delivery
/// is at-least-once: after a restart events from `checkpoint - tolerance` onward are
/// delivered again, so implementations must tolerate reprocessing.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: NostrEvent) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into an [`EventHandler`]
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(NostrEvent) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn handle(&self, event: NostrEvent) -> anyhow::Result<()> {
        (self.0)(event).await
    }
}

/// Wrap an async closure as a shareable handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(NostrEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// One subscription source: a name, its filter and the function processing its events
#[derive(Clone)]
pub struct HandlerDescriptor {
    pub name: String,
    pub filter: Filter,
    pub handler: Arc<dyn EventHandler>,
}

impl HandlerDescriptor {
    pub fn new(name: impl Into<String>, filter: Filter, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            name: name.into(),
            filter,
            handler,
        }
    }
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .field("handler", &"<Arc<dyn EventHandler>>".to_string())
            .finish()
    }
}
