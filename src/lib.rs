#![allow(clippy::doc_markdown)] // Allow technical terms like EOSE, NIP-01 in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Relay Dispatch
//!
//! Resumable event-subscription dispatcher for relay-based publish/subscribe networks.
//!
//! ## Overview
//!
//! Named handlers are attached to long-lived relay subscriptions. Every handler has a
//! checkpoint: the `created_at` of the newest event it processed successfully. Checkpoints
//! are persisted on the network itself as addressable events, so a restarted process
//! resumes each subscription close to where it stopped instead of replaying history.
//!
//! ## Module Organization
//!
//! - [`checkpoint`] - Checkpoint tracker, wire records and the periodic flush cycle
//! - [`dispatcher`] - Handler discovery, subscription windows and event routing
//! - [`events`] - Network event and filter model
//! - [`relay`] - Relay client contract and the in-memory relay
//! - [`registry`] - Handler registration for discovery
//! - [`config`] - Layered configuration loading
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use relay_dispatch::{
//!     handler_fn, DispatcherConfig, Filter, HandlerRegistry, InMemoryRelay, SetupOutcome,
//!     SubscriptionDispatcher, SystemClock,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let relay = Arc::new(InMemoryRelay::new());
//! let dispatcher = SubscriptionDispatcher::new(
//!     relay.clone(),
//!     relay.clone(),
//!     DispatcherConfig::default(),
//!     Arc::new(SystemClock),
//! );
//!
//! let registry = HandlerRegistry::new();
//! registry.register(
//!     "zaps",
//!     Filter::new().kinds([9735]),
//!     handler_fn(|event| async move {
//!         println!("zap {}", event.id);
//!         anyhow::Ok(())
//!     }),
//! );
//!
//! if let SetupOutcome::Started(handles) = dispatcher.setup(&registry).await? {
//!     println!("{} subscriptions running", handles.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod logging;
pub mod registry;
pub mod relay;

pub use checkpoint::{
    CheckpointRecord, CheckpointSettings, CheckpointTracker, FlushReport, FlushStatsSnapshot,
};
pub use clock::{Clock, InstantClock, SystemClock};
pub use config::{ConfigManager, ConfigurationError, DispatcherConfig};
pub use dispatcher::{
    handler_fn, EventHandler, HandlerDescriptor, SetupOutcome, SubscriptionDispatcher,
    SubscriptionHandle, SubscriptionStatsSnapshot,
};
pub use error::{DispatchError, Result};
pub use events::{Filter, NostrEvent};
pub use registry::{HandlerRegistry, HandlerSource};
pub use relay::{
    InMemoryRelay, PoolStats, RelayClient, SubscribeOptions, SubscriptionItem,
    SubscriptionStream,
};
