//! Network listener lifecycle.
//!
//! The control API is served by two listeners: a plain HTTP one and an
//! optional HTTPS one. Both can be reconfigured at runtime by a request that
//! is itself served on the listener being replaced. This module handles that
//! with an explicit restart signal per listener:
//!
//! - [`ListenerCoordinator`] owns the lifecycle state and shuts the listener
//!   down from a dedicated task once the triggering response was flushed
//!   ([`with_flush_ack`]).
//! - [`supervise`] re-arms a fresh listener with current settings every time
//!   the coordinator reports [`ListenerState::Closed`].
//! - [`ListenerSlot`] is the concrete listener, an `axum` server with graceful
//!   shutdown, optionally over `tokio-rustls` ([`TlsListener`]).
//!
//! Graceful shutdown drains in-flight connections without a deadline; a
//! client holding a connection open delays the rebind until it disconnects.

mod coordinator;
mod flush;
mod slot;
mod supervisor;

use async_trait::async_trait;
use strum_macros::Display;

use crate::error_handling::ListenerError;

pub use coordinator::ListenerCoordinator;
pub use flush::with_flush_ack;
pub use slot::{check_port_available, join_host_port, ListenerSlot, TlsListener};
pub use supervisor::supervise;

/// Which control listener a coordinator manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ListenerKind {
    /// Plain HTTP control listener
    #[strum(serialize = "control")]
    Control,
    /// HTTPS listener
    #[strum(serialize = "HTTPS")]
    Https,
}

/// Lifecycle state of a managed listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ListenerState {
    /// Serving, or nothing to serve
    Idle,
    /// A restart was requested; waiting for the triggering response to flush
    PendingShutdown,
    /// Shut down; waiting to be re-armed
    Closed,
}

/// A listener the coordinator can shut down.
#[async_trait]
pub trait ManagedListener: Send + Sync {
    /// Whether the listener currently holds its port.
    fn is_bound(&self) -> bool;

    /// Stops accepting connections and drains in-flight ones.
    async fn shutdown(&self) -> Result<(), ListenerError>;
}
