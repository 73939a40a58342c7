//! # Subscription Dispatcher
//!
//! Opens one long-lived subscription per handler and feeds it matching events.
//!
//! ## Setup Protocol
//!
//! ```text
//! HandlerSource::discover()
//!     ↓ duplicate names?            → SetupOutcome::Duplicates (nothing opened)
//!     ↓ nothing discovered?         → SetupOutcome::Empty
//! CheckpointTracker::new + fetch_last_handled()   (once per dispatcher)
//!     ↓ per handler
//! since = checkpoint - tolerance (or unbounded without checkpoint)
//!     ↓
//! live subscription → handler → CheckpointTracker::hit on success
//! ```
//!
//! Delivery is at-least-once: a resumed subscription re-delivers everything from
//! `checkpoint - tolerance`, and a failed event is logged, never retried.

pub mod handler;
pub mod subscription;

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::checkpoint::{CheckpointSettings, CheckpointTracker};
use crate::clock::Clock;
use crate::config::DispatcherConfig;
use crate::error::{DispatchError, Result};
use crate::registry::HandlerSource;
use crate::relay::{RelayClient, SubscribeOptions};

pub use handler::{handler_fn, EventHandler, FnHandler, HandlerDescriptor};
pub use subscription::{SubscriptionHandle, SubscriptionStatsSnapshot};

use subscription::{run_subscription, SubscriptionStats};

/// Result of [`SubscriptionDispatcher::setup`]
#[derive(Debug)]
pub enum SetupOutcome {
    /// Subscriptions opened, one per handler following the naming convention
    Started(Vec<SubscriptionHandle>),
    /// Names that collided after normalization; no subscription was opened
    Duplicates(Vec<String>),
    /// The source reported no handlers
    Empty,
}

impl SetupOutcome {
    pub fn handles(&self) -> &[SubscriptionHandle] {
        match self {
            Self::Started(handles) => handles,
            _ => &[],
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// Normalized form used to detect colliding handler names
pub fn normalize_handler_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Handler names are single path segments: non-empty, no `/`, whitespace or control characters
pub fn follows_naming_convention(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c == '/' || c.is_whitespace() || c.is_control())
}

/// Lower time bound for a subscription resumed from `checkpoint`
pub fn resume_since(checkpoint: u64, tolerance_seconds: u64) -> Option<u64> {
    (checkpoint > 0).then(|| checkpoint.saturating_sub(tolerance_seconds))
}

fn find_duplicates(descriptors: &[HandlerDescriptor]) -> Vec<String> {
    let mut counter: BTreeMap<String, usize> = BTreeMap::new();
    for descriptor in descriptors {
        *counter
            .entry(normalize_handler_name(&descriptor.name))
            .or_default() += 1;
    }

    counter
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name)
        .collect()
}

/// Routes relay events to named handlers and keeps their checkpoints
#[derive(Debug)]
pub struct SubscriptionDispatcher {
    reader: Arc<dyn RelayClient>,
    writer: Arc<dyn RelayClient>,
    config: DispatcherConfig,
    clock: Arc<dyn Clock>,
    tracker: OnceCell<Arc<CheckpointTracker>>,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
}

impl SubscriptionDispatcher {
    /// `reader` serves subscriptions and the checkpoint load; `writer` publishes checkpoints
    pub fn new(
        reader: Arc<dyn RelayClient>,
        writer: Arc<dyn RelayClient>,
        config: DispatcherConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reader,
            writer,
            config,
            clock,
            tracker: OnceCell::new(),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Checkpoint tracker, once the first successful setup built it
    pub fn tracker(&self) -> Option<Arc<CheckpointTracker>> {
        self.tracker.get().cloned()
    }

    /// Handles of every subscription opened so far
    pub fn subscriptions(&self) -> Vec<SubscriptionHandle> {
        self.subscriptions.lock().clone()
    }

    /// Discover handlers and open their subscriptions.
    ///
    /// Duplicate names abort the whole setup without opening anything. The checkpoint
    /// tracker is built and loaded on the first setup and shared by later ones.
    pub async fn setup<S>(&self, source: &S) -> Result<SetupOutcome>
    where
        S: HandlerSource + ?Sized,
    {
        let candidates = source.discover().await?;

        let duplicates = find_duplicates(&candidates);
        if !duplicates.is_empty() {
            for duplicate in &duplicates {
                warn!(handler = %duplicate, "Found duplicate subscription");
            }
            return Ok(SetupOutcome::Duplicates(duplicates));
        }

        if candidates.is_empty() {
            warn!("No handlers discovered, no subscriptions opened");
            return Ok(SetupOutcome::Empty);
        }

        let tracker = self
            .tracker
            .get_or_try_init(|| async {
                let tracker = Arc::new(CheckpointTracker::new(
                    Arc::clone(&self.reader),
                    Arc::clone(&self.writer),
                    candidates.iter().map(|descriptor| descriptor.name.clone()),
                    CheckpointSettings::from(&self.config.checkpoint),
                    Arc::clone(&self.clock),
                ));
                tracker.fetch_last_handled().await?;
                Ok::<_, DispatchError>(tracker)
            })
            .await?
            .clone();

        let mut handles = Vec::with_capacity(candidates.len());
        for descriptor in candidates {
            if !follows_naming_convention(&descriptor.name) {
                warn!(
                    handler = %descriptor.name,
                    "Skipping handler as it doesn't comply to subscription conventions"
                );
                continue;
            }

            let checkpoint = match tracker.get(&descriptor.name) {
                Ok(checkpoint) => checkpoint,
                Err(e) => {
                    warn!(
                        handler = %descriptor.name,
                        error = %e,
                        "Skipping handler unknown to the checkpoint tracker"
                    );
                    continue;
                }
            };

            let name = descriptor.name.clone();
            match self.open_subscription(descriptor, checkpoint, &tracker).await {
                Ok(handle) => handles.push(handle),
                Err(e) => error!(handler = %name, error = %e, "Failed to open subscription"),
            }
        }

        self.subscriptions.lock().extend(handles.iter().cloned());
        Ok(SetupOutcome::Started(handles))
    }

    async fn open_subscription(
        &self,
        descriptor: HandlerDescriptor,
        checkpoint: u64,
        tracker: &Arc<CheckpointTracker>,
    ) -> Result<SubscriptionHandle> {
        let HandlerDescriptor {
            name,
            mut filter,
            handler,
        } = descriptor;

        let since = resume_since(
            checkpoint,
            self.config.subscriptions.created_at_tolerance_seconds,
        );
        filter.since = since;

        let stream = self
            .reader
            .subscribe(filter, SubscribeOptions::live())
            .await?;

        let stats = Arc::new(SubscriptionStats::default());
        let task = tokio::spawn(run_subscription(
            name.clone(),
            stream,
            handler,
            Arc::clone(tracker),
            Arc::clone(&stats),
            self.config.subscriptions.handler_concurrency,
        ));

        info!(
            handler = %name,
            checkpoint = checkpoint,
            since = ?since,
            "📡 Created subscription"
        );

        Ok(SubscriptionHandle::new(name, since, stats, Arc::new(task)))
    }

    /// Abort every subscription and stop the checkpoint flush timer
    pub fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.subscriptions.lock());
        for handle in &handles {
            handle.abort();
        }
        if let Some(tracker) = self.tracker.get() {
            tracker.shutdown();
        }
        info!(subscriptions = handles.len(), "🛑 Dispatcher shut down");
    }
}
