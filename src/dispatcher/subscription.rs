//! Per-handler subscription loop.

use futures::{FutureExt, StreamExt};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::handler::EventHandler;
use crate::checkpoint::CheckpointTracker;
use crate::error::DispatchError;
use crate::events::NostrEvent;
use crate::relay::{SubscriptionItem, SubscriptionStream};

#[derive(Debug, Default)]
pub(crate) struct SubscriptionStats {
    events_received: AtomicU64,
    events_handled: AtomicU64,
    events_failed: AtomicU64,
}

/// Point-in-time copy of one subscription's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionStatsSnapshot {
    pub events_received: u64,
    pub events_handled: u64,
    pub events_failed: u64,
}

impl SubscriptionStats {
    fn snapshot(&self) -> SubscriptionStatsSnapshot {
        SubscriptionStatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_handled: self.events_handled.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
        }
    }
}

/// A running subscription opened by the dispatcher
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    name: String,
    since: Option<u64>,
    stats: Arc<SubscriptionStats>,
    task: Arc<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        name: String,
        since: Option<u64>,
        stats: Arc<SubscriptionStats>,
        task: Arc<JoinHandle<()>>,
    ) -> Self {
        Self {
            name,
            since,
            stats,
            task,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower time bound the subscription was opened with
    pub fn since(&self) -> Option<u64> {
        self.since
    }

    pub fn stats(&self) -> SubscriptionStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Drive `stream` until it ends, routing events to `handler`.
///
/// Up to `concurrency` events are processed at once; a stalled handler only holds up this
/// subscription.
pub(crate) async fn run_subscription(
    name: String,
    stream: SubscriptionStream,
    handler: Arc<dyn EventHandler>,
    tracker: Arc<CheckpointTracker>,
    stats: Arc<SubscriptionStats>,
    concurrency: usize,
) {
    let name = name.as_str();
    let handler = handler.as_ref();
    let tracker = tracker.as_ref();
    let stats = stats.as_ref();

    stream
        .for_each_concurrent(concurrency.max(1), |item| async move {
            match item {
                SubscriptionItem::Event(event) => {
                    process_event(name, handler, tracker, stats, event).await;
                }
                SubscriptionItem::EndOfStoredEvents => {
                    debug!(handler = %name, "Caught up with stored events");
                }
            }
        })
        .await;

    info!(handler = %name, "Subscription stream ended");
}

async fn process_event(
    name: &str,
    handler: &dyn EventHandler,
    tracker: &CheckpointTracker,
    stats: &SubscriptionStats,
    event: NostrEvent,
) {
    stats.events_received.fetch_add(1, Ordering::Relaxed);
    let event_id = event.id.clone();
    let created_at = event.created_at;

    let outcome = AssertUnwindSafe(handler.handle(event)).catch_unwind().await;
    let error = match outcome {
        Ok(Ok(())) => {
            stats.events_handled.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = tracker.hit(name, created_at) {
                error!(handler = %name, error = %e, "Failed to record checkpoint");
            }
            return;
        }
        Ok(Err(e)) => DispatchError::handler(name, format!("{e:#}")),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            DispatchError::handler(name, format!("panicked: {message}"))
        }
    };

    stats.events_failed.fetch_add(1, Ordering::Relaxed);
    warn!(
        handler = %name,
        event_id = %event_id,
        created_at = created_at,
        error = %error,
        "Unexpected error when handling event"
    );
}
