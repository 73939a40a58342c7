//! # Relay Client Contract
//!
//! The dispatcher consumes the network through [`RelayClient`]. Implementations own the
//! wire protocol, relay selection and signing; this crate only needs subscribe, publish and
//! connection-pool statistics.
//!
//! ```text
//! subscribe(filter) ──▶ Event … Event ─▶ EndOfStoredEvents ─▶ Event …   (live)
//!                                      └▶ stream ends                   (close_on_eose)
//! ```

pub mod memory;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::events::{Filter, NostrEvent};

pub use memory::InMemoryRelay;

/// Item delivered on a subscription stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionItem {
    Event(NostrEvent),
    /// Every stored match has been delivered; later items are live
    EndOfStoredEvents,
}

pub type SubscriptionStream = BoxStream<'static, SubscriptionItem>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscribeOptions {
    /// End the stream right after the end-of-stored-events marker
    pub close_on_eose: bool,
}

impl SubscribeOptions {
    /// Historical replay that ends at end-of-stored-events
    pub fn one_shot() -> Self {
        Self {
            close_on_eose: true,
        }
    }

    /// Subscription that keeps delivering new events
    pub fn live() -> Self {
        Self {
            close_on_eose: false,
        }
    }
}

/// Connection pool statistics reported by a relay client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStats {
    pub connected: usize,
    pub connecting: usize,
    pub disconnected: usize,
    pub total: usize,
}

impl PoolStats {
    pub fn connected(total: usize) -> Self {
        Self {
            connected: total,
            connecting: 0,
            disconnected: 0,
            total,
        }
    }

    /// Publishing requires at least one connected relay and no disconnected relay
    pub fn is_publishable(&self) -> bool {
        self.disconnected == 0 && self.connected > 0
    }
}

/// Network client used for both reading and writing
#[async_trait]
pub trait RelayClient: Send + Sync + std::fmt::Debug {
    /// Open a subscription; stored matches are followed by `EndOfStoredEvents`
    async fn subscribe(&self, filter: Filter, options: SubscribeOptions)
        -> Result<SubscriptionStream>;

    /// Issue an event to the connected relays
    async fn publish(&self, event: NostrEvent) -> Result<()>;

    fn pool_stats(&self) -> PoolStats;

    /// Hex public key events are signed with, if this client signs
    fn public_key(&self) -> Option<String> {
        None
    }
}
