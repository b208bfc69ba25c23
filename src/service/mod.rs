//! Collaborator ports.
//!
//! The gateway depends on three external services: provisioning (assets),
//! the model service (schemas), and one or more ingestion endpoints. Each is
//! reached through a trait so the pipeline can be driven by in-memory fakes;
//! [`HttpServices`] implements all three over HTTP.

mod error;
mod http;

use async_trait::async_trait;

pub use error::{Resource, ServiceError};
pub use http::HttpServices;

use crate::{
    model::{Model, Payload},
    route::{Asset, ModelKey},
};

/// Resolves a device identifier to its provisioning record.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch the asset for `device_id`.
    async fn asset(&self, device_id: &str) -> Result<Asset, ServiceError>;
}

/// Resolves a schema key to its field definitions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelSource: Send + Sync {
    /// Fetch the schema addressed by `key`.
    async fn model(&self, key: &ModelKey) -> Result<Model, ServiceError>;
}

/// Identifies where a payload is filed by an ingestion endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestTarget {
    /// Account owning the payload.
    pub account_id: String,
    /// Machine name of the schema that shaped the payload.
    pub model_name: String,
    /// Device the message came from.
    pub device_id: String,
}

/// Accepts packaged payloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IngestSink: Send + Sync {
    /// Forward `payload` to the ingestion service rooted at `endpoint`.
    async fn ingest(
        &self,
        endpoint: &str,
        target: &IngestTarget,
        payload: &Payload,
    ) -> Result<(), ServiceError>;
}
