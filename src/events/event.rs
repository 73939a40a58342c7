//! Relay event representation.

use serde::{Deserialize, Serialize};

/// Event tag: a name followed by its values, e.g. `["d", "lastHandled:zaps"]`
pub type Tag = Vec<String>;

/// Relay event as delivered by subscriptions and accepted by `publish`.
///
/// `id` and `sig` may be empty on outgoing events; the relay client fills them when it
/// signs. Signing is the client's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NostrEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sig: String,
}

impl NostrEvent {
    pub fn new(kind: u16, created_at: u64, content: impl Into<String>) -> Self {
        Self {
            kind,
            created_at,
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_tag<I, S>(mut self, tag: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.push(tag.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_pubkey(mut self, pubkey: impl Into<String>) -> Self {
        self.pubkey = pubkey.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Values of every tag named `name`, first value only
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |tag| tag.first().map(String::as_str) == Some(name))
            .filter_map(|tag| tag.get(1).map(String::as_str))
    }

    /// Addressable identifier: the value of the first `d` tag
    pub fn identifier(&self) -> Option<&str> {
        self.tag_values(crate::constants::IDENTIFIER_TAG).next()
    }
}
