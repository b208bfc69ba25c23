#![doc(html_root_url = "https://docs.rs/trackwire/latest")]
//! Public API for the `trackwire` gateway library.
//!
//! Tracker devices send batches of `$`-terminated ASCII messages over TCP.
//! The gateway splits them into frames, resolves the device's routes,
//! packages each message according to the route's schema, forwards the
//! payload to every ingestion endpoint, and acknowledges the device with
//! `+SACK:<count>$`.

pub mod codec;
pub mod condition;
pub mod config;
pub mod frame;
pub mod metrics;
pub mod model;
pub mod panic;
pub mod pipeline;
pub mod route;
pub mod server;
pub mod service;

pub use codec::TrackerCodec;
pub use config::{GatewayConfig, ModelKeyStrategy, ReadMode};
pub use frame::{Acknowledgement, Message};
pub use pipeline::{Collaborators, Pipeline};
pub use server::GatewayServer;
