//! Wire form of a checkpoint.
//!
//! A checkpoint record is an addressable event: kind [`CHECKPOINT_KIND`], a single
//! `["d", "<prefix>:<handler>"]` tag and the decimal timestamp as content. The event's own
//! `created_at` is the publish time, not the checkpoint value.
//!
//! [`CHECKPOINT_KIND`]: crate::constants::CHECKPOINT_KIND

use crate::config::CheckpointConfig;
use crate::constants::IDENTIFIER_TAG;
use crate::events::NostrEvent;

/// Record kind and tag prefix shared by encoding and decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointSettings {
    pub kind: u16,
    pub tag_prefix: String,
    pub flush_interval: std::time::Duration,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self::from(&CheckpointConfig::default())
    }
}

impl From<&CheckpointConfig> for CheckpointSettings {
    fn from(config: &CheckpointConfig) -> Self {
        Self {
            kind: config.kind,
            tag_prefix: config.tag_prefix.clone(),
            flush_interval: config.flush_interval(),
        }
    }
}

impl CheckpointSettings {
    /// `d` tag value identifying the record of `handler`
    pub fn tag_value(&self, handler: &str) -> String {
        format!("{}:{handler}", self.tag_prefix)
    }

    /// Handler name encoded in a `d` tag value, if the value has the record shape
    pub fn handler_from_tag<'a>(&self, value: &'a str) -> Option<&'a str> {
        value
            .strip_prefix(self.tag_prefix.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .filter(|handler| !handler.is_empty())
    }
}

/// Checkpoint of one handler as carried on the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRecord {
    pub handler: String,
    pub timestamp: u64,
}

impl CheckpointRecord {
    pub fn new(handler: impl Into<String>, timestamp: u64) -> Self {
        Self {
            handler: handler.into(),
            timestamp,
        }
    }

    /// Build the unsigned event published at `published_at`
    pub fn to_event(
        &self,
        settings: &CheckpointSettings,
        pubkey: Option<&str>,
        published_at: u64,
    ) -> NostrEvent {
        let event = NostrEvent::new(settings.kind, published_at, self.timestamp.to_string())
            .with_tag([IDENTIFIER_TAG.to_string(), settings.tag_value(&self.handler)]);

        match pubkey {
            Some(pubkey) => event.with_pubkey(pubkey),
            None => event,
        }
    }

    /// Decode a received event; `None` for anything that is not a well-formed record
    pub fn from_event(event: &NostrEvent, settings: &CheckpointSettings) -> Option<Self> {
        if event.kind != settings.kind {
            return None;
        }
        let handler = settings.handler_from_tag(event.identifier()?)?;
        let timestamp = event.content.trim().parse::<u64>().ok()?;

        Some(Self::new(handler, timestamp))
    }
}
