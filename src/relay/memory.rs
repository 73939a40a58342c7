//! # In-Memory Relay
//!
//! Single-process relay used by tests and local runs. Stores published events, replays
//! stored matches followed by end-of-stored-events, and forwards later publishes to open
//! live subscriptions. Parameterized replaceable events keep only the newest version per
//! `(kind, pubkey, d)` address.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use super::{PoolStats, RelayClient, SubscribeOptions, SubscriptionItem, SubscriptionStream};
use crate::constants::kinds;
use crate::error::{DispatchError, Result};
use crate::events::{Filter, NostrEvent};

#[derive(Debug)]
struct LiveSubscription {
    filter: Filter,
    sender: mpsc::UnboundedSender<SubscriptionItem>,
}

#[derive(Debug)]
pub struct InMemoryRelay {
    public_key: Option<String>,
    store: Mutex<Vec<NostrEvent>>,
    live: DashMap<Uuid, LiveSubscription>,
    published: Mutex<Vec<NostrEvent>>,
    pool_stats: Mutex<PoolStats>,
    pool_stats_queries: AtomicUsize,
    fail_publishes: AtomicBool,
}

impl Default for InMemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRelay {
    /// Relay reporting a single connected connection
    pub fn new() -> Self {
        Self {
            public_key: None,
            store: Mutex::new(Vec::new()),
            live: DashMap::new(),
            published: Mutex::new(Vec::new()),
            pool_stats: Mutex::new(PoolStats::connected(1)),
            pool_stats_queries: AtomicUsize::new(0),
            fail_publishes: AtomicBool::new(false),
        }
    }

    /// Author outgoing events that carry no pubkey with `public_key`
    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }

    pub fn set_pool_stats(&self, stats: PoolStats) {
        *self.pool_stats.lock() = stats;
    }

    /// Number of `pool_stats` calls so far
    pub fn pool_stats_queries(&self) -> usize {
        self.pool_stats_queries.load(Ordering::SeqCst)
    }

    /// Make every following `publish` fail until reset
    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Events accepted through `publish`, in order
    pub fn published(&self) -> Vec<NostrEvent> {
        self.published.lock().clone()
    }

    /// Store an event as history without recording it as published or forwarding it
    pub fn seed(&self, event: NostrEvent) {
        let event = self.complete(event);
        Self::store_event(&mut self.store.lock(), event);
    }

    /// Currently stored events
    pub fn stored(&self) -> Vec<NostrEvent> {
        self.store.lock().clone()
    }

    pub fn live_subscription_count(&self) -> usize {
        self.live.retain(|_, sub| !sub.sender.is_closed());
        self.live.len()
    }

    fn complete(&self, mut event: NostrEvent) -> NostrEvent {
        if event.id.is_empty() {
            event.id = Uuid::new_v4().simple().to_string();
        }
        if event.pubkey.is_empty() {
            if let Some(public_key) = &self.public_key {
                event.pubkey = public_key.clone();
            }
        }
        event
    }

    fn store_event(store: &mut Vec<NostrEvent>, event: NostrEvent) {
        if kinds::is_parameterized_replaceable(event.kind) {
            let address_of = |event: &NostrEvent| {
                (
                    event.kind,
                    event.pubkey.clone(),
                    event.identifier().map(str::to_owned),
                )
            };
            let address = address_of(&event);
            let same_address = |stored: &NostrEvent| address_of(stored) == address;

            if store
                .iter()
                .any(|stored| same_address(stored) && stored.created_at > event.created_at)
            {
                trace!(event_id = %event.id, "Newer version already stored, ignoring");
                return;
            }
            store.retain(|stored| !same_address(stored));
        }
        store.push(event);
    }
}

#[async_trait]
impl RelayClient for InMemoryRelay {
    async fn subscribe(
        &self,
        filter: Filter,
        options: SubscribeOptions,
    ) -> Result<SubscriptionStream> {
        let (sender, receiver) = mpsc::unbounded_channel();

        {
            // Registration happens under the store lock so no publish slips between
            // the historical snapshot and the live registration
            let store = self.store.lock();
            let mut matches: Vec<NostrEvent> = store
                .iter()
                .filter(|event| filter.matches(event))
                .cloned()
                .collect();
            matches.sort_by_key(|event| event.created_at);
            if let Some(limit) = filter.limit {
                let excess = matches.len().saturating_sub(limit);
                matches.drain(..excess);
            }

            debug!(
                stored_matches = matches.len(),
                close_on_eose = options.close_on_eose,
                "Opening in-memory subscription"
            );

            for event in matches {
                let _ = sender.send(SubscriptionItem::Event(event));
            }
            let _ = sender.send(SubscriptionItem::EndOfStoredEvents);

            if !options.close_on_eose {
                self.live
                    .insert(Uuid::new_v4(), LiveSubscription { filter, sender });
            }
        }

        Ok(futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|item| (item, receiver))
        })
        .boxed())
    }

    async fn publish(&self, event: NostrEvent) -> Result<()> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(DispatchError::relay("publish", "relay rejected event"));
        }

        let event = self.complete(event);
        self.published.lock().push(event.clone());

        let mut store = self.store.lock();
        Self::store_event(&mut store, event.clone());
        self.live.retain(|_, sub| {
            if sub.filter.matches(&event) {
                sub.sender
                    .send(SubscriptionItem::Event(event.clone()))
                    .is_ok()
            } else {
                !sub.sender.is_closed()
            }
        });

        Ok(())
    }

    fn pool_stats(&self) -> PoolStats {
        self.pool_stats_queries.fetch_add(1, Ordering::SeqCst);
        *self.pool_stats.lock()
    }

    fn public_key(&self) -> Option<String> {
        self.public_key.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect_until_eose(stream: &mut SubscriptionStream) -> Vec<NostrEvent> {
        let mut events = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                SubscriptionItem::Event(event) => events.push(event),
                SubscriptionItem::EndOfStoredEvents => break,
            }
        }
        events
    }

    #[tokio::test]
    async fn test_one_shot_replays_history_then_closes() {
        let relay = InMemoryRelay::new();
        relay.seed(NostrEvent::new(1, 20, "b"));
        relay.seed(NostrEvent::new(1, 10, "a"));
        relay.seed(NostrEvent::new(7, 15, "other kind"));

        let mut stream = relay
            .subscribe(Filter::new().kinds([1]), SubscribeOptions::one_shot())
            .await
            .unwrap();

        let contents: Vec<_> = collect_until_eose(&mut stream)
            .await
            .into_iter()
            .map(|event| event.content)
            .collect();
        assert_eq!(contents, vec!["a", "b"]);
        assert!(stream.next().await.is_none());
        assert_eq!(relay.live_subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_live_subscription_receives_new_publishes() {
        let relay = InMemoryRelay::new();
        let mut stream = relay
            .subscribe(Filter::new().kinds([1]), SubscribeOptions::live())
            .await
            .unwrap();
        assert!(collect_until_eose(&mut stream).await.is_empty());

        relay.publish(NostrEvent::new(7, 5, "skip")).await.unwrap();
        relay.publish(NostrEvent::new(1, 6, "keep")).await.unwrap();

        match stream.next().await {
            Some(SubscriptionItem::Event(event)) => assert_eq!(event.content, "keep"),
            other => panic!("unexpected item {other:?}"),
        }
        assert_eq!(relay.live_subscription_count(), 1);

        drop(stream);
        assert_eq!(relay.live_subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_addressable_events_keep_newest_version() {
        let relay = InMemoryRelay::new().with_public_key("writer");
        let record = |created_at, content: &str| {
            NostrEvent::new(31111, created_at, content).with_tag(["d", "lastHandled:zaps"])
        };

        relay.publish(record(100, "1")).await.unwrap();
        relay.publish(record(160, "2")).await.unwrap();
        relay.publish(record(130, "stale")).await.unwrap();

        let stored = relay.stored();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "2");
        assert_eq!(stored[0].pubkey, "writer");
        assert_eq!(relay.published().len(), 3);
    }

    #[tokio::test]
    async fn test_limit_keeps_newest_matches() {
        let relay = InMemoryRelay::new();
        for created_at in 1..=5 {
            relay.seed(NostrEvent::new(1, created_at, created_at.to_string()));
        }

        let mut stream = relay
            .subscribe(Filter::new().limit(2), SubscribeOptions::one_shot())
            .await
            .unwrap();
        let events = collect_until_eose(&mut stream).await;
        assert_eq!(
            events.iter().map(|e| e.created_at).collect::<Vec<_>>(),
            vec![4, 5]
        );
    }

    #[tokio::test]
    async fn test_injected_publish_failure() {
        let relay = InMemoryRelay::new();
        relay.fail_publishes(true);
        let err = relay.publish(NostrEvent::new(1, 1, "")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Relay { .. }));
        assert!(relay.published().is_empty());
    }
}
