//! # Dispatch Constants
//!
//! Wire-level and timing constants shared by the checkpoint tracker and the dispatcher.
//! Configuration defaults are derived from these values.

/// Event kind of checkpoint records (parameterized replaceable range)
pub const CHECKPOINT_KIND: u16 = 31111;

/// Prefix of the `d` tag value identifying a checkpoint record
pub const CHECKPOINT_TAG_PREFIX: &str = "lastHandled";

/// Tag name carrying the addressable identifier
pub const IDENTIFIER_TAG: &str = "d";

/// Seconds between two checkpoint flush cycles
pub const FLUSH_INTERVAL_SECONDS: u64 = 60;

/// Seconds subtracted from a resumed checkpoint to tolerate late or reordered delivery
pub const CREATED_AT_TOLERANCE_SECONDS: u64 = 2 * 180;

/// Events processed concurrently per subscription
pub const DEFAULT_HANDLER_CONCURRENCY: usize = 16;

/// Kinds treated as parameterized replaceable by relays
pub mod kinds {
    use std::ops::Range;

    pub const PARAMETERIZED_REPLACEABLE: Range<u16> = 30000..40000;

    pub fn is_parameterized_replaceable(kind: u16) -> bool {
        PARAMETERIZED_REPLACEABLE.contains(&kind)
    }
}
