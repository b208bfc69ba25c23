//! Connection-level behaviour driven over in-memory streams.

use std::time::Duration;

use rstest::{fixture, rstest};
use trackwire::{
    condition::{Condition, ParserKind},
    config::{GatewayConfig, ReadMode},
    frame::FramingError,
    model::{Field, Model},
    pipeline::Pipeline,
    route::Route,
    server::{ConnectionError, ConnectionSettings, ConnectionSummary},
};
use trackwire_testing::{
    RecordingIngest,
    StaticAssets,
    StaticModels,
    collaborators,
    drive_connection,
};

#[fixture]
fn config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.read_timeout = Duration::from_secs(1);
    config.services.ingest = vec!["http://ts".into(), "http://id".into()];
    config
}

fn pipeline(config: &GatewayConfig, ingest: RecordingIngest) -> Pipeline {
    let fri_only = Route::new("acme", "M1")
        .with_condition(Condition::new(ParserKind::IndexRegex.as_str(), "1|GTFRI"));
    Pipeline::new(
        config,
        collaborators(
            StaticAssets::default().with_routes("865000", vec![fri_only]),
            StaticModels::default().with_model(
                "acme",
                "M1",
                Model {
                    machine_name: "m1".into(),
                    fields: vec![Field::new(3, "a")],
                },
            ),
            ingest,
        ),
    )
}

fn settings(config: &GatewayConfig, read_mode: ReadMode) -> ConnectionSettings {
    ConnectionSettings {
        read_mode,
        ..ConnectionSettings::from(config)
    }
}

#[rstest]
#[case(ReadMode::Single)]
#[case(ReadMode::Stream)]
#[tokio::test]
async fn malformed_frames_are_skipped_without_dropping_neighbours(
    config: GatewayConfig,
    #[case] mode: ReadMode,
) {
    let ingest = RecordingIngest::default();
    let pipeline = pipeline(&config, ingest.clone());
    let input =
        b"+RESP:GTFRI,01,865000,A,1$garbage$$NOHEADER,01,865000,2$+RESP:GTFRI,01,865000,B,3$";

    let outcome = drive_connection(&pipeline, &settings(&config, mode), vec![input.to_vec()])
        .await
        .expect("drive connection");

    assert_eq!(outcome.output_text(), "+SACK:1$+SACK:3$");
    let summary = outcome.result.expect("connection succeeds");
    assert_eq!(summary, ConnectionSummary { frames: 5, acknowledged: 2 });
    assert_eq!(ingest.forwarded().len(), 4);
}

#[rstest]
#[tokio::test]
async fn unmatched_route_is_still_acknowledged(config: GatewayConfig) {
    let ingest = RecordingIngest::default();
    let pipeline = pipeline(&config, ingest.clone());

    let outcome = drive_connection(
        &pipeline,
        &settings(&config, ReadMode::Single),
        vec![b"+RESP:GTHBD,01,865000,A,4$".to_vec()],
    )
    .await
    .expect("drive connection");

    assert_eq!(outcome.output_text(), "+SACK:4$");
    assert!(ingest.forwarded().is_empty());
}

#[rstest]
#[tokio::test]
async fn failing_endpoint_does_not_block_acknowledgement(config: GatewayConfig) {
    let ingest = RecordingIngest::default().failing("http://id");
    let pipeline = pipeline(&config, ingest.clone());

    let outcome = drive_connection(
        &pipeline,
        &settings(&config, ReadMode::Single),
        vec![b"+RESP:GTFRI,01,865000,A,5$".to_vec()],
    )
    .await
    .expect("drive connection");

    assert_eq!(outcome.output_text(), "+SACK:5$");
    let forwarded = ingest.forwarded();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].endpoint, "http://ts");
}

#[rstest]
#[tokio::test]
async fn single_mode_processes_nothing_from_a_partial_batch(config: GatewayConfig) {
    let ingest = RecordingIngest::default();
    let pipeline = pipeline(&config, ingest.clone());

    let outcome = drive_connection(
        &pipeline,
        &settings(&config, ReadMode::Single),
        vec![b"+RESP:GTFRI,01,865000,A,5$+RESP:GTF".to_vec()],
    )
    .await
    .expect("drive connection");

    assert!(outcome.output.is_empty());
    assert!(matches!(
        outcome.result,
        Err(ConnectionError::Framing(FramingError::Unterminated { .. }))
    ));
    assert!(ingest.forwarded().is_empty());
}

#[rstest]
#[tokio::test]
async fn whitespace_only_batch_is_rejected(config: GatewayConfig) {
    let pipeline = pipeline(&config, RecordingIngest::default());

    let outcome = drive_connection(
        &pipeline,
        &settings(&config, ReadMode::Single),
        vec![b" \r\n".to_vec()],
    )
    .await
    .expect("drive connection");

    assert!(matches!(
        outcome.result,
        Err(ConnectionError::Framing(FramingError::Empty))
    ));
}
