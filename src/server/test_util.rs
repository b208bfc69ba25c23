//! Test helpers shared across server modules.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use rstest::fixture;

use super::{Bound, ConnectionSettings, GatewayServer};
use crate::{
    config::{GatewayConfig, ReadMode},
    model::{Field, Model, Payload},
    pipeline::{Collaborators, Pipeline},
    route::{Asset, ModelKey, Route},
    service::{AssetSource, IngestSink, IngestTarget, ModelSource, Resource, ServiceError},
};

/// Serves every device the same single-route asset.
pub struct OneRouteAssets;

#[async_trait]
impl AssetSource for OneRouteAssets {
    async fn asset(&self, device_id: &str) -> Result<Asset, ServiceError> {
        Ok(Asset {
            id: format!("imei-{device_id}"),
            routes: vec![Route::new("acme", "M1")],
        })
    }
}

/// Panics on every lookup.
pub struct PanickingAssets;

#[async_trait]
impl AssetSource for PanickingAssets {
    async fn asset(&self, _device_id: &str) -> Result<Asset, ServiceError> { panic!("boom") }
}

/// Knows only the `M1` schema.
pub struct TwoFieldModels;

#[async_trait]
impl ModelSource for TwoFieldModels {
    async fn model(&self, key: &ModelKey) -> Result<Model, ServiceError> {
        if key.model_id != "M1" {
            return Err(ServiceError::NotFound {
                resource: Resource::Model,
                id: key.to_string(),
            });
        }
        Ok(Model {
            machine_name: "m1".into(),
            fields: vec![Field::new(3, "a"), Field::new(4, "b")],
        })
    }
}

/// Records every forwarded payload and always succeeds.
#[derive(Clone, Default)]
pub struct RecordingIngest {
    pub calls: Arc<Mutex<Vec<(String, IngestTarget, Payload)>>>,
}

#[async_trait]
impl IngestSink for RecordingIngest {
    async fn ingest(
        &self,
        endpoint: &str,
        target: &IngestTarget,
        payload: &Payload,
    ) -> Result<(), ServiceError> {
        self.calls
            .lock()
            .expect("ingest calls lock")
            .push((endpoint.to_owned(), target.clone(), payload.clone()));
        Ok(())
    }
}

#[fixture]
pub fn config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.read_timeout = Duration::from_secs(1);
    config.services.ingest = vec!["http://ts".into()];
    config
}

#[fixture]
pub fn settings() -> ConnectionSettings {
    ConnectionSettings {
        read_mode: ReadMode::Single,
        ..ConnectionSettings::from(&config())
    }
}

/// Pipeline resolving every device to route `M1` and forwarding to `ingest`.
pub fn pipeline_with(ingest: RecordingIngest) -> Pipeline {
    Pipeline::new(
        &config(),
        Collaborators {
            assets: Arc::new(OneRouteAssets),
            models: Arc::new(TwoFieldModels),
            ingest: Arc::new(ingest),
        },
    )
}

/// Pipeline whose asset lookup panics.
pub fn panicking_pipeline() -> Pipeline {
    Pipeline::new(
        &config(),
        Collaborators {
            assets: Arc::new(PanickingAssets),
            models: Arc::new(TwoFieldModels),
            ingest: Arc::new(RecordingIngest::default()),
        },
    )
}

#[fixture]
/// Returns a bound [`StdTcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents another process from claiming the
/// port between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

pub fn bind_server(pipeline: Pipeline, listener: StdTcpListener) -> GatewayServer<Bound> {
    GatewayServer::new(&config(), pipeline)
        .bind_existing_listener(listener)
        .expect("Failed to bind")
}
