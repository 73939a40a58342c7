//! # Dispatch Errors
//!
//! Error taxonomy shared by the checkpoint tracker, the dispatcher and relay clients.

use crate::config::ConfigurationError;

/// Errors surfaced by checkpoint tracking and subscription dispatch
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Handler name outside the set fixed at tracker construction
    #[error("Handler '{name}' is out of range for this checkpoint tracker")]
    UnknownHandler { name: String },

    /// Relay client failed to subscribe or publish
    #[error("Relay {operation} failed: {reason}")]
    Relay { operation: String, reason: String },

    /// Handler processing failure
    #[error("Handler '{handler}' failed: {reason}")]
    Handler { handler: String, reason: String },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl DispatchError {
    pub fn unknown_handler(name: impl Into<String>) -> Self {
        Self::UnknownHandler { name: name.into() }
    }

    pub fn relay(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Relay {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    pub fn handler(handler: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Handler {
            handler: handler.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the range error raised on unknown handler names
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::UnknownHandler { .. })
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
