//! Unit tests for the message pipeline.

use std::sync::{Arc, Mutex};

use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::{
    condition::Condition,
    model::{Field, Model},
    route::{Asset, Route, SYSTEM_ROUTE_TYPE},
    service::{MockAssetSource, MockIngestSink, MockModelSource, Resource},
};

const FRAME: &str = "+RESP:GTFRI,060228,865000,12.34,56.78,7";

#[fixture]
fn config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.services.ingest = vec!["http://ts".into(), "http://id".into()];
    config
}

fn asset_with(routes: Vec<Route>) -> MockAssetSource {
    let mut assets = MockAssetSource::new();
    assets.expect_asset().returning(move |device_id| {
        let asset = Asset {
            id: format!("imei-{device_id}"),
            routes: routes.clone(),
        };
        Ok(asset)
    });
    assets
}

fn two_field_models() -> MockModelSource {
    let mut models = MockModelSource::new();
    models.expect_model().returning(|key| {
        let model = Model {
            machine_name: format!("{}_v1", key.model_id),
            fields: vec![Field::new(3, "lat").in_group("gps"), Field::new(4, "lng").in_group("gps")],
        };
        Ok(model)
    });
    models
}

fn recording_ingest(
    calls: &Arc<Mutex<Vec<(String, IngestTarget, Payload)>>>,
    failing_endpoint: Option<&'static str>,
) -> MockIngestSink {
    let mut ingest = MockIngestSink::new();
    let calls = Arc::clone(calls);
    ingest
        .expect_ingest()
        .returning(move |endpoint, target, payload| {
            calls
                .lock()
                .expect("lock")
                .push((endpoint.to_owned(), target.clone(), payload.clone()));
            let result = if failing_endpoint == Some(endpoint) {
                Err(ServiceError::UnexpectedStatus {
                    url: format!("{endpoint}/rx"),
                    status: 500,
                })
            } else {
                Ok(())
            };
            result
        });
    ingest
}

fn pipeline(
    config: &GatewayConfig,
    assets: MockAssetSource,
    models: MockModelSource,
    ingest: MockIngestSink,
) -> Pipeline {
    Pipeline::new(
        config,
        Collaborators {
            assets: Arc::new(assets),
            models: Arc::new(models),
            ingest: Arc::new(ingest),
        },
    )
}

#[rstest]
#[tokio::test]
async fn forwards_payload_to_every_endpoint_and_acknowledges(config: GatewayConfig) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline(
        &config,
        asset_with(vec![Route::new("acme", "M1")]),
        two_field_models(),
        recording_ingest(&calls, None),
    );

    let report = pipeline.process_frame(FRAME).await.expect("processed");
    assert_eq!(report.acknowledgement.expect("count present").count(), "7");
    assert_eq!(report.routes.len(), 1);

    let calls = calls.lock().expect("lock");
    let endpoints: Vec<&str> = calls.iter().map(|(e, _, _)| e.as_str()).collect();
    assert_eq!(endpoints, ["http://ts", "http://id"]);
    for (_, target, payload) in calls.iter() {
        assert_eq!(target.account_id, "acme");
        assert_eq!(target.model_name, "M1_v1");
        assert_eq!(target.device_id, "865000");
        assert_eq!(
            serde_json::Value::Object(payload.clone()),
            json!({"gps": {"lat": "12.34", "lng": "56.78"}})
        );
    }
}

#[rstest]
#[tokio::test]
async fn malformed_frames_skip_lookups(config: GatewayConfig) {
    let mut assets = MockAssetSource::new();
    assets.expect_asset().never();
    let mut ingest = MockIngestSink::new();
    ingest.expect_ingest().never();
    let pipeline = pipeline(&config, assets, MockModelSource::new(), ingest);

    assert!(pipeline.process_frame("+RESP:GTFRI,7").await.is_none());
    assert!(pipeline.process_frame("GTFRI,01,865000,7").await.is_none());
}

#[rstest]
#[tokio::test]
async fn missing_asset_skips_message_without_acknowledgement(config: GatewayConfig) {
    let mut assets = MockAssetSource::new();
    assets.expect_asset().times(1).returning(|device_id| {
        Err(ServiceError::NotFound {
            resource: Resource::Asset,
            id: device_id.to_owned(),
        })
    });
    let mut models = MockModelSource::new();
    models.expect_model().never();
    let pipeline = pipeline(&config, assets, models, MockIngestSink::new());

    assert!(pipeline.process_frame(FRAME).await.is_none());
}

#[rstest]
#[tokio::test]
async fn missing_model_skips_route_but_still_acknowledges(config: GatewayConfig) {
    let mut models = MockModelSource::new();
    models.expect_model().times(1).returning(|key| {
        Err(ServiceError::NotFound {
            resource: Resource::Model,
            id: key.to_string(),
        })
    });
    let mut ingest = MockIngestSink::new();
    ingest.expect_ingest().never();
    let pipeline = pipeline(
        &config,
        asset_with(vec![Route::new("acme", "M1")]),
        models,
        ingest,
    );

    let report = pipeline.process_frame(FRAME).await.expect("processed");
    assert!(matches!(
        report.routes[0].outcome,
        RouteOutcome::ModelUnavailable(ServiceError::NotFound { .. })
    ));
    assert!(report.acknowledgement.is_some());
}

#[rstest]
#[tokio::test]
async fn failing_endpoint_does_not_block_others(config: GatewayConfig) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline(
        &config,
        asset_with(vec![Route::new("acme", "M1")]),
        two_field_models(),
        recording_ingest(&calls, Some("http://ts")),
    );

    let report = pipeline.process_frame(FRAME).await.expect("processed");
    assert_eq!(calls.lock().expect("lock").len(), 2);
    let RouteOutcome::Forwarded { failures, .. } = &report.routes[0].outcome else {
        panic!("route should have been forwarded");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].endpoint, "http://ts");
    assert!(report.acknowledgement.is_some());
}

#[rstest]
#[tokio::test]
async fn routes_are_filtered_and_namespaced(config: GatewayConfig) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let routes = vec![
        Route::new("acme", "fri")
            .with_kind(SYSTEM_ROUTE_TYPE)
            .with_condition(Condition::new("qlrx_msg_regex", "GTFRI")),
        Route::new("acme", "hbd").with_condition(Condition::new("qlrx_msg_regex", "GTHBD")),
        Route::new("globex", "any"),
    ];
    let pipeline = pipeline(
        &config,
        asset_with(routes),
        two_field_models(),
        recording_ingest(&calls, None),
    );

    let report = pipeline.process_frame(FRAME).await.expect("processed");
    let keys: Vec<String> = report.routes.iter().map(|r| r.model_key.to_string()).collect();
    assert_eq!(keys, ["system_/fri", "globex/any"]);

    let accounts: Vec<String> = calls
        .lock()
        .expect("lock")
        .iter()
        .map(|(_, target, _)| target.account_id.clone())
        .collect();
    assert_eq!(accounts, ["acme", "acme", "globex", "globex"]);
}

#[rstest]
#[tokio::test]
async fn empty_count_is_processed_without_acknowledgement(config: GatewayConfig) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline(
        &config,
        asset_with(vec![Route::new("acme", "M1")]),
        two_field_models(),
        recording_ingest(&calls, None),
    );

    let report = pipeline
        .process_frame("+RESP:GTFRI,060228,865000,12.34,56.78,")
        .await
        .expect("processed");
    assert!(report.acknowledgement.is_none());
    assert_eq!(calls.lock().expect("lock").len(), 2);
}
