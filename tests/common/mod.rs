//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use relay_dispatch::{
    DispatchError, Filter, NostrEvent, PoolStats, RelayClient, Result, SubscribeOptions,
    SubscriptionItem, SubscriptionStream,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};

/// Genesis block time, used as the frozen "now" of timer tests
pub const NOW: u64 = 1_231_006_505;

pub const WRITER_PUBKEY: &str = "0ce32219d1fce60df30b59b2b3885edea84341444a422918ff8d6cf641ecfa6b";

/// Relay whose subscription contents are scripted by the test through a channel
#[derive(Debug)]
pub struct ScriptedRelay {
    script_sender: mpsc::UnboundedSender<SubscriptionItem>,
    script_receiver: Mutex<Option<mpsc::UnboundedReceiver<SubscriptionItem>>>,
    subscriptions: Mutex<Vec<(Filter, SubscribeOptions)>>,
    published: Mutex<Vec<NostrEvent>>,
    pool_stats: Mutex<PoolStats>,
    pool_stats_queries: AtomicUsize,
    gated: AtomicBool,
    stalled_identifiers: Mutex<Vec<String>>,
    publish_started: Notify,
    publish_release: Semaphore,
}

impl ScriptedRelay {
    pub fn new() -> Self {
        let (script_sender, script_receiver) = mpsc::unbounded_channel();
        Self {
            script_sender,
            script_receiver: Mutex::new(Some(script_receiver)),
            subscriptions: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            pool_stats: Mutex::new(PoolStats::connected(1)),
            pool_stats_queries: AtomicUsize::new(0),
            gated: AtomicBool::new(false),
            stalled_identifiers: Mutex::new(Vec::new()),
            publish_started: Notify::new(),
            publish_release: Semaphore::new(0),
        }
    }

    /// Queue an item for the (single) subscription this relay serves
    pub fn emit(&self, item: SubscriptionItem) {
        self.script_sender.send(item).expect("script receiver dropped");
    }

    pub fn emit_event(&self, event: NostrEvent) {
        self.emit(SubscriptionItem::Event(event));
    }

    pub fn emit_eose(&self) {
        self.emit(SubscriptionItem::EndOfStoredEvents);
    }

    pub fn subscriptions(&self) -> Vec<(Filter, SubscribeOptions)> {
        self.subscriptions.lock().clone()
    }

    pub fn published(&self) -> Vec<NostrEvent> {
        self.published.lock().clone()
    }

    pub fn set_pool_stats(&self, stats: PoolStats) {
        *self.pool_stats.lock() = stats;
    }

    pub fn pool_stats_queries(&self) -> usize {
        self.pool_stats_queries.load(Ordering::SeqCst)
    }

    /// Hold every publish until `release_publish` is called
    pub fn gate_publishes(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// Never acknowledge publishes of events whose `d` tag is `identifier`
    pub fn stall_publishes_of(&self, identifier: &str) {
        self.stalled_identifiers.lock().push(identifier.to_string());
    }

    pub async fn wait_publish_started(&self) {
        self.publish_started.notified().await;
    }

    pub fn release_publish(&self) {
        self.publish_release.add_permits(1);
    }
}

#[async_trait]
impl RelayClient for ScriptedRelay {
    async fn subscribe(
        &self,
        filter: Filter,
        options: SubscribeOptions,
    ) -> Result<SubscriptionStream> {
        self.subscriptions.lock().push((filter, options));
        let receiver = self
            .script_receiver
            .lock()
            .take()
            .ok_or_else(|| DispatchError::relay("subscribe", "script already consumed"))?;

        Ok(futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|item| (item, receiver))
        })
        .boxed())
    }

    async fn publish(&self, event: NostrEvent) -> Result<()> {
        let stalled = event.identifier().is_some_and(|identifier| {
            self.stalled_identifiers
                .lock()
                .iter()
                .any(|stalled| stalled == identifier)
        });
        if stalled {
            std::future::pending::<()>().await;
        }
        if self.gated.load(Ordering::SeqCst) {
            self.publish_started.notify_one();
            self.publish_release
                .acquire()
                .await
                .map_err(|e| DispatchError::relay("publish", e))?
                .forget();
        }
        self.published.lock().push(event);
        Ok(())
    }

    fn pool_stats(&self) -> PoolStats {
        self.pool_stats_queries.fetch_add(1, Ordering::SeqCst);
        *self.pool_stats.lock()
    }

    fn public_key(&self) -> Option<String> {
        Some(WRITER_PUBKEY.to_string())
    }
}

/// Checkpoint record as another process would have published it
pub fn checkpoint_event(tag: &str, content: &str, created_at: u64) -> NostrEvent {
    NostrEvent::new(31111, created_at, content)
        .with_pubkey(WRITER_PUBKEY)
        .with_tag(["d", tag])
}

/// Poll `condition` on the real clock until it holds or five seconds pass
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Run `future` to completion, failing the test after five seconds
pub async fn within_timeout<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("operation timed out")
}
