//! Utilities for exercising `trackwire` without real collaborators.
//!
//! [`fakes`] provides in-memory implementations of the collaborator traits,
//! [`drive`] feeds bytes through a connection over `tokio::io::duplex`, and
//! [`http_stub`] serves canned responses to the `reqwest` client.
//!
//! ```rust
//! use trackwire::{config::GatewayConfig, route::Route};
//! use trackwire_testing::{RecordingIngest, StaticAssets, StaticModels, collaborators};
//!
//! let ingest = RecordingIngest::default();
//! let collaborators = collaborators(
//!     StaticAssets::default().with_routes("865000", vec![Route::new("acme", "M1")]),
//!     StaticModels::default(),
//!     ingest.clone(),
//! );
//! # let _ = (collaborators, GatewayConfig::default());
//! ```

pub mod drive;
pub mod fakes;
pub mod http_stub;

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

pub use drive::{DriveOutcome, drive_connection};
pub use fakes::{ForwardedPayload, RecordingIngest, StaticAssets, StaticModels, collaborators};
pub use http_stub::{HttpStub, Method, RecordedRequest, StubServer, envelope};
use rstest::fixture;

/// Create a TCP listener bound to a free local port.
///
/// # Errors
///
/// Returns any IO error encountered while binding to an ephemeral localhost
/// port.
pub fn unused_listener() -> std::io::Result<StdTcpListener> {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr)
}

/// rstest fixture wrapping [`unused_listener`].
///
/// # Panics
///
/// Panics if no local port can be bound.
#[fixture]
pub fn free_listener() -> StdTcpListener { unused_listener().expect("bind free local port") }
