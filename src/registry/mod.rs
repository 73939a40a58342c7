//! # Handler Registry
//!
//! Discovery of handler descriptors for the dispatcher.
//!
//! The dispatcher does not know how handlers are found; it asks a [`HandlerSource`] for
//! candidates and validates them itself. [`HandlerRegistry`] is the in-process source:
//! handlers are registered programmatically at startup.

pub mod handler_registry;

pub use handler_registry::{HandlerRegistry, HandlerSource};
