//! Gateway configuration.
//!
//! [`GatewayConfig`] is built once at startup and shared read-only by the
//! server, the pipeline, and the HTTP collaborators.

use std::{fmt, net::SocketAddr, str::FromStr, time::Duration};

use thiserror::Error;

/// How the connection handler reads from a socket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// One read into a fixed-size buffer; the batch must arrive whole.
    #[default]
    Single,
    /// Framed reads until EOF or the deadline; partial frames are buffered.
    Stream,
}

/// How a route's base model id becomes a concrete schema key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModelKeyStrategy {
    /// Use the route's model id as is; routes select by condition.
    #[default]
    Conditional,
    /// Append the lowercased `_<type>_<protocol>` of the message.
    TypeSuffixed,
}

/// A configuration value that failed to parse.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {what}: {value:?}")]
pub struct ParseConfigError {
    what: &'static str,
    value: String,
}

impl ReadMode {
    /// Name used on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Stream => "stream",
        }
    }
}

impl FromStr for ReadMode {
    type Err = ParseConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "stream" => Ok(Self::Stream),
            _ => Err(ParseConfigError {
                what: "read mode",
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl ModelKeyStrategy {
    /// Name used on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conditional => "conditional",
            Self::TypeSuffixed => "type-suffixed",
        }
    }
}

impl FromStr for ModelKeyStrategy {
    type Err = ParseConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conditional" => Ok(Self::Conditional),
            "type-suffixed" | "type_suffixed" => Ok(Self::TypeSuffixed),
            _ => Err(ParseConfigError {
                what: "model key strategy",
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for ModelKeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Base URLs of the HTTP collaborators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceUrls {
    /// Provisioning service answering asset lookups.
    pub provision: String,
    /// Model service answering schema lookups.
    pub model: String,
    /// Ingestion endpoints, invoked in this order for every payload.
    pub ingest: Vec<String>,
}

impl Default for ServiceUrls {
    fn default() -> Self {
        Self {
            provision: "http://api-provision:8070".into(),
            model: "http://api-tm:8070".into(),
            ingest: vec!["http://rxtx-ts:80".into(), "http://rxtx-id:80".into()],
        }
    }
}

/// Immutable gateway configuration.
///
/// # Default Values
/// - `listen_addr`: `127.0.0.1:3000`
/// - `read_timeout`: 10 seconds
/// - `buffer_size`: 1600 bytes
/// - `asset_id_prefix`: `imei-`
/// - `system_prefix`: `system_`
/// - `http_timeout`: 10 seconds
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Address the TCP listener binds to.
    pub listen_addr: SocketAddr,
    /// Deadline for the read phase of each connection.
    pub read_timeout: Duration,
    /// Read buffer size, and the maximum frame length in stream mode.
    pub buffer_size: usize,
    /// Socket read strategy.
    pub read_mode: ReadMode,
    /// Prefix joined to the device id to form the asset id.
    pub asset_id_prefix: String,
    /// Namespace used for schemas of system routes.
    pub system_prefix: String,
    /// Schema key derivation.
    pub model_key_strategy: ModelKeyStrategy,
    /// Collaborator base URLs.
    pub services: ServiceUrls,
    /// Per-request timeout for collaborator calls.
    pub http_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            read_timeout: Duration::from_secs(10),
            buffer_size: 1600,
            read_mode: ReadMode::default(),
            asset_id_prefix: "imei-".into(),
            system_prefix: "system_".into(),
            model_key_strategy: ModelKeyStrategy::default(),
            services: ServiceUrls::default(),
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl GatewayConfig {
    /// Clamp values that would make the server unusable.
    ///
    /// A zero buffer or zero timeout would drop every connection, so both are
    /// raised to a minimum of one byte and one millisecond respectively.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.buffer_size = self.buffer_size.max(1);
        self.read_timeout = self.read_timeout.max(Duration::from_millis(1));
        self.http_timeout = self.http_timeout.max(Duration::from_millis(1));
        self
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("single", ReadMode::Single)]
    #[case("STREAM", ReadMode::Stream)]
    fn read_mode_parses(#[case] input: &str, #[case] expected: ReadMode) {
        assert_eq!(input.parse::<ReadMode>(), Ok(expected));
    }

    #[rstest]
    #[case("conditional", ModelKeyStrategy::Conditional)]
    #[case("type-suffixed", ModelKeyStrategy::TypeSuffixed)]
    #[case("type_suffixed", ModelKeyStrategy::TypeSuffixed)]
    fn model_key_strategy_parses(#[case] input: &str, #[case] expected: ModelKeyStrategy) {
        assert_eq!(input.parse::<ModelKeyStrategy>(), Ok(expected));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let err = "merged".parse::<ModelKeyStrategy>().expect_err("unknown strategy");
        assert_eq!(err.to_string(), "invalid model key strategy: \"merged\"");
        assert!("batch".parse::<ReadMode>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for mode in [ReadMode::Single, ReadMode::Stream] {
            assert_eq!(mode.to_string().parse::<ReadMode>(), Ok(mode));
        }
        for strategy in [ModelKeyStrategy::Conditional, ModelKeyStrategy::TypeSuffixed] {
            assert_eq!(strategy.to_string().parse::<ModelKeyStrategy>(), Ok(strategy));
        }
    }

    #[test]
    fn defaults_match_deployment() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.listen_addr.port(), 3000);
        assert_eq!(cfg.buffer_size, 1600);
        assert_eq!(cfg.services.ingest.len(), 2);
        assert_eq!(cfg.model_key_strategy, ModelKeyStrategy::Conditional);
    }

    #[test]
    fn normalized_clamps_zero_values() {
        let cfg = GatewayConfig {
            buffer_size: 0,
            read_timeout: Duration::ZERO,
            http_timeout: Duration::ZERO,
            ..GatewayConfig::default()
        }
        .normalized();
        assert_eq!(cfg.buffer_size, 1);
        assert_eq!(cfg.read_timeout, Duration::from_millis(1));
        assert_eq!(cfg.http_timeout, Duration::from_millis(1));
    }
}
