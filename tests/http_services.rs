//! `HttpServices` against a canned-response HTTP server.

use std::time::Duration;

use rstest::rstest;
use serde_json::{Map, Value, json};
use trackwire::{
    config::GatewayConfig,
    model::{Field, Model},
    route::{Asset, ModelKey, Route},
    service::{
        AssetSource,
        HttpServices,
        IngestSink,
        IngestTarget,
        ModelSource,
        Resource,
        ServiceError,
    },
};
use trackwire_testing::{HttpStub, Method, StubServer, envelope};

fn services(server: &StubServer) -> HttpServices {
    let mut config = GatewayConfig::default();
    config.services.provision = server.url();
    config.services.model = format!("{}/", server.url());
    config.http_timeout = Duration::from_secs(2);
    HttpServices::new(&config).expect("build HTTP client")
}

#[tokio::test]
async fn asset_lookup_unwraps_envelope() {
    let asset = Asset {
        id: "imei-865000".into(),
        routes: vec![Route::new("acme", "M1")],
    };
    let server = HttpStub::new()
        .respond(Method::GET, "/asset/imei-865000", 200, envelope(&asset))
        .start()
        .await
        .expect("start stub");

    let found = services(&server).asset("865000").await.expect("asset found");

    assert_eq!(found, asset);
    assert_eq!(server.requests().len(), 1);
}

#[rstest]
#[case(404, true)]
#[case(500, false)]
#[tokio::test]
async fn asset_lookup_maps_status(#[case] status: u16, #[case] not_found: bool) {
    let server = HttpStub::new()
        .respond(Method::GET, "/asset/imei-1", status, "")
        .start()
        .await
        .expect("start stub");

    let err = services(&server).asset("1").await.expect_err("lookup fails");

    assert_eq!(err.is_not_found(), not_found);
    match err {
        ServiceError::NotFound { resource, id } => {
            assert_eq!(resource, Resource::Asset);
            assert_eq!(id, "imei-1");
        }
        ServiceError::UnexpectedStatus { status: got, url } => {
            assert_eq!(got, status);
            assert!(url.ends_with("/asset/imei-1"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_body_is_a_decode_error() {
    let server = HttpStub::new()
        .respond(Method::GET, "/asset/imei-1", 200, "{\"payload\":{}}")
        .start()
        .await
        .expect("start stub");

    let err = services(&server).asset("1").await.expect_err("decode fails");
    assert!(matches!(err, ServiceError::Decode { .. }));
}

#[tokio::test]
async fn model_lookup_uses_namespace_and_key() {
    let model = Model {
        machine_name: "fri".into(),
        fields: vec![Field::new(3, "lat").in_group("gps")],
    };
    let server = HttpStub::new()
        .respond(Method::GET, "/model/system_/fri", 200, envelope(&model))
        .start()
        .await
        .expect("start stub");
    let key = ModelKey {
        namespace: "system_".into(),
        model_id: "fri".into(),
    };

    let found = services(&server).model(&key).await.expect("model found");

    assert_eq!(found, model);
    let requests = server.requests();
    assert_eq!(requests[0].path, "/model/system_/fri");
}

#[rstest]
#[case(200, true)]
#[case(201, false)]
#[case(503, false)]
#[tokio::test]
async fn ingest_posts_payload_and_requires_ok(#[case] status: u16, #[case] accepted: bool) {
    let server = HttpStub::new()
        .respond(Method::POST, "/rx/acme/m1/865000/device", status, "")
        .start()
        .await
        .expect("start stub");
    let target = IngestTarget {
        account_id: "acme".into(),
        model_name: "m1".into(),
        device_id: "865000".into(),
    };
    let Value::Object(payload) = json!({"a": "A", "gps": {"lat": "1"}}) else {
        unreachable!("literal is an object")
    };

    let result = services(&server)
        .ingest(&format!("{}/", server.url()), &target, &payload)
        .await;

    assert_eq!(result.is_ok(), accepted);
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::POST);
    let body: Map<String, Value> = serde_json::from_str(&requests[0].body).expect("JSON body");
    assert_eq!(body, payload);
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = trackwire_testing::unused_listener().expect("reserve port");
    let url = format!("http://{}", listener.local_addr().expect("addr"));
    drop(listener);
    let mut config = GatewayConfig::default();
    config.services.provision = url;
    config.http_timeout = Duration::from_secs(1);

    let err = HttpServices::new(&config)
        .expect("build HTTP client")
        .asset("1")
        .await
        .expect_err("nothing listens");
    assert!(matches!(err, ServiceError::Transport { .. }));
}
