//! Tokio-based TCP server for tracker connections.
//!
//! [`GatewayServer`] runs a single accept loop and spawns one task per
//! accepted connection. Each task reads the device's frames under a
//! deadline, drives them through the shared [`Pipeline`], and writes the
//! acknowledgements back before the socket is closed.

use std::sync::Arc;

use tokio::{net::TcpListener, sync::oneshot};

use crate::{config::GatewayConfig, pipeline::Pipeline};

mod binding;
mod connection;
pub mod error;
mod runtime;

pub use connection::{ConnectionError, ConnectionSettings, ConnectionSummary, handle_connection};
pub use error::ServerError;
pub use runtime::BackoffConfig;

/// TCP server feeding device connections into a [`Pipeline`].
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// or [`Bound`]. Only bound servers expose `run`.
pub struct GatewayServer<S = Unbound>
where
    S: ServerState,
{
    pub(crate) pipeline: Arc<Pipeline>,
    pub(crate) settings: ConnectionSettings,
    pub(crate) backoff_config: BackoffConfig,
    /// Fired once the accept loop has been spawned.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    pub(crate) state: S,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

impl GatewayServer<Unbound> {
    /// Create an unbound server using the connection settings from `config`.
    pub fn new(config: &GatewayConfig, pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            settings: ConnectionSettings::from(config),
            backoff_config: BackoffConfig::default(),
            ready_tx: None,
            state: Unbound,
        }
    }
}

impl<S> GatewayServer<S>
where
    S: ServerState,
{
    /// Notify `tx` once the server has started accepting connections.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Override the back-off applied after failed `accept()` calls.
    #[must_use]
    pub fn accept_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff_config = backoff.normalized();
        self
    }

    /// Per-connection settings in effect.
    pub fn settings(&self) -> &ConnectionSettings { &self.settings }
}

#[cfg(test)]
pub(crate) mod test_util;
