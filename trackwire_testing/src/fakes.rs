//! In-memory collaborators.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use trackwire::{
    model::{Model, Payload},
    pipeline::Collaborators,
    route::{Asset, ModelKey, Route},
    service::{AssetSource, IngestSink, IngestTarget, ModelSource, Resource, ServiceError},
};

/// Bundle fakes into pipeline [`Collaborators`].
pub fn collaborators(
    assets: StaticAssets,
    models: StaticModels,
    ingest: RecordingIngest,
) -> Collaborators {
    Collaborators {
        assets: Arc::new(assets),
        models: Arc::new(models),
        ingest: Arc::new(ingest),
    }
}

/// Assets keyed by device id; unknown devices are `NotFound`.
#[derive(Clone, Debug, Default)]
pub struct StaticAssets {
    assets: HashMap<String, Asset>,
}

impl StaticAssets {
    /// Register `routes` for `device_id`.
    #[must_use]
    pub fn with_routes(mut self, device_id: &str, routes: Vec<Route>) -> Self {
        self.assets.insert(
            device_id.to_owned(),
            Asset {
                id: format!("imei-{device_id}"),
                routes,
            },
        );
        self
    }
}

#[async_trait]
impl AssetSource for StaticAssets {
    async fn asset(&self, device_id: &str) -> Result<Asset, ServiceError> {
        self.assets
            .get(device_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound {
                resource: Resource::Asset,
                id: device_id.to_owned(),
            })
    }
}

/// Schemas keyed by `namespace/model_id`; unknown keys are `NotFound`.
#[derive(Clone, Debug, Default)]
pub struct StaticModels {
    models: HashMap<String, Model>,
}

impl StaticModels {
    /// Register `model` under `namespace/model_id`.
    #[must_use]
    pub fn with_model(mut self, namespace: &str, model_id: &str, model: Model) -> Self {
        self.models.insert(format!("{namespace}/{model_id}"), model);
        self
    }
}

#[async_trait]
impl ModelSource for StaticModels {
    async fn model(&self, key: &ModelKey) -> Result<Model, ServiceError> {
        let id = key.to_string();
        self.models
            .get(&id)
            .cloned()
            .ok_or(ServiceError::NotFound {
                resource: Resource::Model,
                id,
            })
    }
}

/// A payload accepted by [`RecordingIngest`].
#[derive(Clone, Debug, PartialEq)]
pub struct ForwardedPayload {
    pub endpoint: String,
    pub target: IngestTarget,
    pub payload: Payload,
}

/// Records forwarded payloads.
///
/// Endpoints registered with [`RecordingIngest::failing`] answer with an
/// unexpected status instead of recording.
#[derive(Clone, Debug, Default)]
pub struct RecordingIngest {
    forwarded: Arc<Mutex<Vec<ForwardedPayload>>>,
    failing: HashSet<String>,
}

impl RecordingIngest {
    /// Make `endpoint` reject every payload.
    #[must_use]
    pub fn failing(mut self, endpoint: &str) -> Self {
        self.failing.insert(endpoint.to_owned());
        self
    }

    /// Payloads accepted so far, in arrival order.
    #[must_use]
    pub fn forwarded(&self) -> Vec<ForwardedPayload> {
        self.forwarded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl IngestSink for RecordingIngest {
    async fn ingest(
        &self,
        endpoint: &str,
        target: &IngestTarget,
        payload: &Payload,
    ) -> Result<(), ServiceError> {
        if self.failing.contains(endpoint) {
            return Err(ServiceError::UnexpectedStatus {
                url: endpoint.to_owned(),
                status: 503,
            });
        }
        self.forwarded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ForwardedPayload {
                endpoint: endpoint.to_owned(),
                target: target.clone(),
                payload: payload.clone(),
            });
        Ok(())
    }
}
