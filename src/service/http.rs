//! HTTP implementation of the collaborator ports.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};

use super::{AssetSource, IngestSink, IngestTarget, ModelSource, Resource, ServiceError};
use crate::{
    config::GatewayConfig,
    model::{Model, Payload},
    route::{Asset, ModelKey},
};

/// Lookup responses wrap the record as `{"payload": {"_source": ...}}`.
#[derive(Deserialize)]
struct ResultAck<T> {
    payload: Hit<T>,
}

#[derive(Deserialize)]
struct Hit<T> {
    #[serde(rename = "_source")]
    source: T,
}

/// `reqwest`-backed client for provisioning, model, and ingestion services.
///
/// The inner [`Client`] pools connections and is safe to share between
/// connection tasks.
#[derive(Clone, Debug)]
pub struct HttpServices {
    client: Client,
    provision_url: String,
    model_url: String,
    asset_id_prefix: String,
}

impl HttpServices {
    /// Build a client from the gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(config.http_timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(ServiceError::Client)?;
        Ok(Self::with_client(client, config))
    }

    /// Use an existing client.
    pub fn with_client(client: Client, config: &GatewayConfig) -> Self {
        Self {
            client,
            provision_url: trim_base(&config.services.provision),
            model_url: trim_base(&config.services.model),
            asset_id_prefix: config.asset_id_prefix.clone(),
        }
    }

    async fn lookup<T: DeserializeOwned>(
        &self,
        url: String,
        resource: Resource,
        id: &str,
    ) -> Result<T, ServiceError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ServiceError::Transport {
                url: url.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return Err(ServiceError::NotFound {
                    resource,
                    id: id.to_owned(),
                });
            }
            status => {
                return Err(ServiceError::UnexpectedStatus {
                    url,
                    status: status.as_u16(),
                });
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ServiceError::Transport {
                url: url.clone(),
                source,
            })?;
        let ack: ResultAck<T> =
            serde_json::from_slice(&body).map_err(|source| ServiceError::Decode { url, source })?;
        Ok(ack.payload.source)
    }
}

fn trim_base(url: &str) -> String { url.trim_end_matches('/').to_owned() }

#[async_trait]
impl AssetSource for HttpServices {
    async fn asset(&self, device_id: &str) -> Result<Asset, ServiceError> {
        let asset_id = format!("{}{device_id}", self.asset_id_prefix);
        let url = format!("{}/asset/{asset_id}", self.provision_url);
        self.lookup(url, Resource::Asset, &asset_id).await
    }
}

#[async_trait]
impl ModelSource for HttpServices {
    async fn model(&self, key: &ModelKey) -> Result<Model, ServiceError> {
        let url = format!("{}/model/{}/{}", self.model_url, key.namespace, key.model_id);
        self.lookup(url, Resource::Model, &key.to_string()).await
    }
}

#[async_trait]
impl IngestSink for HttpServices {
    async fn ingest(
        &self,
        endpoint: &str,
        target: &IngestTarget,
        payload: &Payload,
    ) -> Result<(), ServiceError> {
        let url = format!(
            "{}/rx/{}/{}/{}/device",
            endpoint.trim_end_matches('/'),
            target.account_id,
            target.model_name,
            target.device_id
        );
        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|source| ServiceError::Transport {
                url: url.clone(),
                source,
            })?;

        if response.status() == StatusCode::OK {
            Ok(())
        } else {
            Err(ServiceError::UnexpectedStatus {
                url,
                status: response.status().as_u16(),
            })
        }
    }
}
