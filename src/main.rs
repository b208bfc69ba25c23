//! `trackwire` gateway binary.
//!
//! Reads configuration from flags and the environment, installs logging and
//! the optional Prometheus exporter, then serves device connections until
//! Ctrl+C.

mod cli;

use std::time::Duration;

use clap::Parser;
use trackwire::{
    config::{GatewayConfig, ParseConfigError, ServiceUrls},
    pipeline::{Collaborators, Pipeline},
    server::GatewayServer,
};
use tracing_subscriber::EnvFilter;

fn gateway_config(cli: &cli::Cli) -> Result<GatewayConfig, ParseConfigError> {
    let config = GatewayConfig {
        listen_addr: cli.listen_addr(),
        read_timeout: Duration::from_secs(cli.tcp_read_timeout),
        buffer_size: cli.tcp_buffer_size,
        read_mode: cli.read_mode.parse()?,
        asset_id_prefix: cli.asset_id_prefix.clone(),
        system_prefix: cli.system_prefix.clone(),
        model_key_strategy: cli.model_key_strategy.parse()?,
        services: ServiceUrls {
            provision: cli.provision_service.clone(),
            model: cli.model_service.clone(),
            ingest: vec![cli.ingest_ts_service.clone(), cli.ingest_id_service.clone()],
        },
        http_timeout: Duration::from_secs(cli.http_timeout),
    };
    Ok(config.normalized())
}

#[cfg(feature = "metrics")]
fn install_metrics_exporter(
    addr: Option<std::net::SocketAddr>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(addr) = addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        tracing::info!(%addr, "metrics exporter listening");
    }
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics_exporter(
    addr: Option<std::net::SocketAddr>,
) -> Result<(), Box<dyn std::error::Error>> {
    if addr.is_some() {
        tracing::warn!("--metrics-addr ignored: built without the `metrics` feature");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();
    let config = gateway_config(&cli)?;
    install_metrics_exporter(cli.metrics_addr)?;

    let pipeline = Pipeline::new(&config, Collaborators::http(&config)?);
    GatewayServer::new(&config, pipeline)
        .bind(config.listen_addr)?
        .run()
        .await?;
    Ok(())
}
