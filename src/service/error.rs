//! Errors raised by collaborator calls.

use std::fmt;

use thiserror::Error;

/// Resource looked up from a collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    /// Provisioning record.
    Asset,
    /// Data-model schema.
    Model,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asset => "asset",
            Self::Model => "model",
        })
    }
}

/// Failure of a single collaborator call.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The collaborator answered 404.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// What was looked up.
        resource: Resource,
        /// Identifier that was not found.
        id: String,
    },

    /// The collaborator answered with a status other than 200 or 404.
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus {
        /// Request URL.
        url: String,
        /// Status code received.
        status: u16,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Request URL.
        url: String,
        /// Underlying client error.
        source: reqwest::Error,
    },

    /// The response body was not the expected JSON.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// Request URL.
        url: String,
        /// Underlying decode error.
        source: serde_json::Error,
    },
}

impl ServiceError {
    /// Returns true if the collaborator reported the resource missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound { .. }) }
}
