//! # Checkpoints
//!
//! Last-handled timestamps per handler, persisted on the relay network as addressable
//! events and republished by a periodic flush.

pub mod record;
pub mod tracker;

pub use record::{CheckpointRecord, CheckpointSettings};
pub use tracker::{CheckpointTracker, FlushReport, FlushStatsSnapshot};
