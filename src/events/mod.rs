//! # Event Model
//!
//! Relay events and subscription filters as exchanged with relay clients.

pub mod event;
pub mod filter;

pub use event::{NostrEvent, Tag};
pub use filter::Filter;
