//! Command line interface for the `trackwire` gateway.
//!
//! Every option can also be supplied through the environment variable named
//! in its help text. This file is shared with `build.rs` to render the man
//! page, so it depends on nothing but `clap`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::{Parser, builder::PossibleValuesParser};

/// Command line arguments for the `trackwire` binary.
#[derive(Debug, Parser)]
#[command(
    name = "trackwire",
    version,
    about = "TCP gateway for $-framed tracker telemetry"
)]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, env = "TCP_IP", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub tcp_ip: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "TCP_PORT", default_value_t = 3000)]
    pub tcp_port: u16,

    /// Seconds a connection may take to deliver its frames.
    #[arg(long, env = "TCP_READ_TIMEOUT", default_value_t = 10)]
    pub tcp_read_timeout: u64,

    /// Bytes read per connection; the frame length limit in stream mode.
    #[arg(long, env = "TCP_BUFFER_SIZE", default_value_t = 1600)]
    pub tcp_buffer_size: usize,

    /// `single` reads once per connection; `stream` reassembles frames across reads.
    #[arg(
        long,
        env = "READ_MODE",
        default_value = "single",
        value_parser = PossibleValuesParser::new(["single", "stream"])
    )]
    pub read_mode: String,

    /// Base URL of the provisioning service.
    #[arg(long, env = "PROVISION_SERVICE", default_value = "http://api-provision:8070")]
    pub provision_service: String,

    /// Base URL of the model service.
    #[arg(long, env = "MODEL_SERVICE", default_value = "http://api-tm:8070")]
    pub model_service: String,

    /// Base URL of the time-series ingestion service.
    #[arg(long, env = "INGEST_TS_SERVICE", default_value = "http://rxtx-ts:80")]
    pub ingest_ts_service: String,

    /// Base URL of the identity ingestion service.
    #[arg(long, env = "INGEST_ID_SERVICE", default_value = "http://rxtx-id:80")]
    pub ingest_id_service: String,

    /// Prefix joined to the device id to form the asset id.
    #[arg(long, env = "ASSET_ID_PREFIX", default_value = "imei-")]
    pub asset_id_prefix: String,

    /// Namespace of schemas used by system routes.
    #[arg(long, env = "SYSTEM_PREFIX", default_value = "system_")]
    pub system_prefix: String,

    /// How schema keys are derived from routes.
    #[arg(
        long,
        env = "MODEL_KEY_STRATEGY",
        default_value = "conditional",
        value_parser = PossibleValuesParser::new(["conditional", "type-suffixed"])
    )]
    pub model_key_strategy: String,

    /// Seconds before a collaborator request is abandoned.
    #[arg(long, env = "HTTP_TIMEOUT", default_value_t = 10)]
    pub http_timeout: u64,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Socket address assembled from `--tcp-ip` and `--tcp-port`.
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr { SocketAddr::new(self.tcp_ip, self.tcp_port) }
}
