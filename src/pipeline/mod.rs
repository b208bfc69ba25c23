//! Per-message processing.
//!
//! [`Pipeline`] takes one decoded frame through asset lookup, route
//! selection, schema lookup, packaging, and forwarding. Every failure along
//! the way is logged and confined to the unit it affects: a missing asset
//! skips the message, a missing schema skips the route, and a failed
//! forward affects only that endpoint.

use std::sync::Arc;

use futures::future::join_all;

use crate::{
    config::GatewayConfig,
    frame::{Acknowledgement, Message},
    metrics::{self, MessageOutcome},
    model::{self, Payload},
    route::{ModelKey, ResolvedRoute, RouteResolver},
    service::{AssetSource, HttpServices, IngestSink, IngestTarget, ModelSource, ServiceError},
};

/// Handles to the external services used by the pipeline.
#[derive(Clone)]
pub struct Collaborators {
    /// Provisioning lookups.
    pub assets: Arc<dyn AssetSource>,
    /// Schema lookups.
    pub models: Arc<dyn ModelSource>,
    /// Payload forwarding.
    pub ingest: Arc<dyn IngestSink>,
}

impl Collaborators {
    /// Use one HTTP client for all three services.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] if the HTTP client cannot be built.
    pub fn http(config: &GatewayConfig) -> Result<Self, ServiceError> {
        let http = Arc::new(HttpServices::new(config)?);
        Ok(Self {
            assets: http.clone(),
            models: http.clone(),
            ingest: http,
        })
    }
}

/// A forward that did not succeed.
#[derive(Debug)]
pub struct IngestFailure {
    /// Ingestion endpoint base URL.
    pub endpoint: String,
    /// Why the forward failed.
    pub error: ServiceError,
}

/// Result of routing one accepted route.
#[derive(Debug)]
pub enum RouteOutcome {
    /// The payload was handed to every endpoint; `failures` lists the ones
    /// that rejected it.
    Forwarded {
        /// Packaged payload.
        payload: Payload,
        /// Endpoints that failed.
        failures: Vec<IngestFailure>,
    },
    /// The schema could not be fetched; nothing was forwarded.
    ModelUnavailable(ServiceError),
}

/// What happened to one accepted route.
#[derive(Debug)]
pub struct RouteReport {
    /// Schema the route resolved to.
    pub model_key: ModelKey,
    /// Forwarding result.
    pub outcome: RouteOutcome,
}

/// Summary of processing one message.
#[derive(Debug, Default)]
pub struct MessageReport {
    /// Accepted routes in provisioning order.
    pub routes: Vec<RouteReport>,
    /// Acknowledgement to write back, if the message carried a count.
    pub acknowledgement: Option<Acknowledgement>,
}

/// Drives messages through routing, packaging, and forwarding.
#[derive(Clone)]
pub struct Pipeline {
    resolver: RouteResolver,
    endpoints: Vec<String>,
    collaborators: Collaborators,
}

impl Pipeline {
    /// Build a pipeline from configuration and collaborator handles.
    pub fn new(config: &GatewayConfig, collaborators: Collaborators) -> Self {
        Self {
            resolver: RouteResolver::new(config.model_key_strategy, config.system_prefix.clone()),
            endpoints: config.services.ingest.clone(),
            collaborators,
        }
    }

    /// Parse and process one frame.
    ///
    /// Returns `None` when the frame is skipped: it is malformed or its
    /// device could not be resolved. Skipped frames are never acknowledged.
    pub async fn process_frame(&self, raw: &str) -> Option<MessageReport> {
        match Message::parse(raw) {
            Ok(message) => self.process(&message).await,
            Err(error) => {
                tracing::warn!(%error, frame = raw, "skipping malformed message");
                metrics::inc_messages(MessageOutcome::Skipped);
                None
            }
        }
    }

    /// Process a parsed message.
    ///
    /// Returns `None` when the asset lookup fails.
    pub async fn process(&self, message: &Message) -> Option<MessageReport> {
        tracing::debug!(
            elements = message.elements().len(),
            device_id = message.device_id(),
            kind = message.kind(),
            protocol = message.protocol_version(),
            count = message.sequence_count(),
            "lookup"
        );

        let asset = match self.collaborators.assets.asset(message.device_id()).await {
            Ok(asset) => asset,
            Err(error) => {
                tracing::warn!(
                    %error,
                    device_id = message.device_id(),
                    "unable to retrieve asset related to message"
                );
                metrics::inc_messages(MessageOutcome::Skipped);
                return None;
            }
        };

        let mut routes = Vec::new();
        for resolved in self.resolver.resolve(&asset, message) {
            routes.push(self.route(message, resolved).await);
        }

        metrics::inc_messages(MessageOutcome::Processed);
        Some(MessageReport {
            routes,
            acknowledgement: message.acknowledgement(),
        })
    }

    async fn route(&self, message: &Message, resolved: ResolvedRoute<'_>) -> RouteReport {
        let ResolvedRoute { route, model_key } = resolved;
        tracing::debug!(
            account = %route.account_id,
            base_model = %route.model_id,
            kind = %route.kind,
            model = %model_key,
            "route message for asset"
        );

        let model = match self.collaborators.models.model(&model_key).await {
            Ok(model) => model,
            Err(error) => {
                tracing::warn!(%error, model = %model_key, "unable to retrieve model related to asset");
                return RouteReport {
                    model_key,
                    outcome: RouteOutcome::ModelUnavailable(error),
                };
            }
        };

        let payload = model::package(message.elements(), &model);
        let target = IngestTarget {
            account_id: route.account_id.clone(),
            model_name: model.machine_name,
            device_id: message.device_id().to_owned(),
        };
        let failures = self.forward(&target, &payload).await;
        RouteReport {
            model_key,
            outcome: RouteOutcome::Forwarded { payload, failures },
        }
    }

    /// Send `payload` to every endpoint concurrently.
    async fn forward(&self, target: &IngestTarget, payload: &Payload) -> Vec<IngestFailure> {
        let ingest = &self.collaborators.ingest;
        let sends = self.endpoints.iter().map(|endpoint| async move {
            (endpoint, ingest.ingest(endpoint, target, payload).await)
        });

        let mut failures = Vec::new();
        for (endpoint, result) in join_all(sends).await {
            metrics::inc_forwards(result.is_ok());
            match result {
                Ok(()) => {
                    tracing::info!(
                        endpoint = %endpoint,
                        account = %target.account_id,
                        model = %target.model_name,
                        device_id = %target.device_id,
                        "injected message"
                    );
                    tracing::debug!(?payload, "payload");
                }
                Err(error) => {
                    tracing::warn!(%error, endpoint = %endpoint, "could not inject payload");
                    failures.push(IngestFailure {
                        endpoint: endpoint.clone(),
                        error,
                    });
                }
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests;
