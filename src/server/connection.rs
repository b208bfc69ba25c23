//! Per-connection handling for [`GatewayServer`](super::GatewayServer).
//!
//! A connection has a single read phase bounded by the configured deadline.
//! In [`ReadMode::Single`] one read fills the buffer and every complete frame
//! in it is processed; in [`ReadMode::Stream`] frames are decoded as they
//! arrive until the peer closes or the deadline passes. Acknowledgements are
//! written as soon as their message has been processed.

use std::{io, net::SocketAddr, time::Duration};

use futures::{FutureExt, SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::{Instant, timeout, timeout_at},
};
use tokio_util::{codec::Framed, task::TaskTracker};
use tracing::Instrument;

use crate::{
    codec::{CodecError, TrackerCodec},
    config::{GatewayConfig, ReadMode},
    frame::{Acknowledgement, FramingError, split_frames},
    pipeline::Pipeline,
};

/// Read settings applied to every connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Deadline for the whole read phase.
    pub read_timeout: Duration,
    /// Single-read buffer size, or maximum frame length when streaming.
    pub buffer_size: usize,
    /// Socket read strategy.
    pub read_mode: ReadMode,
}

impl From<&GatewayConfig> for ConnectionSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            read_timeout: config.read_timeout,
            buffer_size: config.buffer_size.max(1),
            read_mode: config.read_mode,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self { Self::from(&GatewayConfig::default()) }
}

/// Why a connection ended early.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The read deadline expired.
    #[error("read timed out after {0:?}")]
    Timeout(Duration),
    /// Reading from the socket failed.
    #[error("read error: {0}")]
    Read(#[source] io::Error),
    /// Writing an acknowledgement failed.
    #[error("failed to write acknowledgement: {0}")]
    Write(#[source] io::Error),
    /// The bytes read could not be cut into frames.
    #[error("invalid message: {0}")]
    Framing(#[from] FramingError),
}

impl From<CodecError> for ConnectionError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Framing(e) => Self::Framing(e),
            CodecError::Io(e) => Self::Read(e),
        }
    }
}

/// Counters describing a completed connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectionSummary {
    /// Frames handed to the pipeline.
    pub frames: usize,
    /// Acknowledgements written back to the device.
    pub acknowledged: usize,
}

/// Serve one device connection to completion.
///
/// Frames are processed sequentially in arrival order. A clean close before
/// any data returns an empty summary.
///
/// # Errors
///
/// Returns [`ConnectionError`] when the deadline expires, the socket fails,
/// or the data cannot be framed. Acknowledgements written before the error
/// stay written.
pub async fn handle_connection<S>(
    stream: S,
    pipeline: &Pipeline,
    settings: &ConnectionSettings,
) -> Result<ConnectionSummary, ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match settings.read_mode {
        ReadMode::Single => read_once(stream, pipeline, settings).await,
        ReadMode::Stream => read_stream(stream, pipeline, settings).await,
    }
}

async fn read_once<S>(
    mut stream: S,
    pipeline: &Pipeline,
    settings: &ConnectionSettings,
) -> Result<ConnectionSummary, ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut summary = ConnectionSummary::default();
    let mut buf = vec![0u8; settings.buffer_size];
    let n = timeout(settings.read_timeout, stream.read(&mut buf))
        .await
        .map_err(|_| ConnectionError::Timeout(settings.read_timeout))?
        .map_err(ConnectionError::Read)?;
    if n == 0 {
        return Ok(summary);
    }

    let frames = split_frames(buf.get(..n).unwrap_or_default())?;
    for frame in frames {
        summary.frames += 1;
        if let Some(ack) = acknowledgement_for(pipeline, &frame).await {
            stream
                .write_all(&ack.to_bytes())
                .await
                .map_err(ConnectionError::Write)?;
            summary.acknowledged += 1;
        }
    }
    stream.flush().await.map_err(ConnectionError::Write)?;
    Ok(summary)
}

async fn read_stream<S>(
    stream: S,
    pipeline: &Pipeline,
    settings: &ConnectionSettings,
) -> Result<ConnectionSummary, ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut summary = ConnectionSummary::default();
    let deadline = Instant::now() + settings.read_timeout;
    let mut framed = Framed::new(stream, TrackerCodec::new(settings.buffer_size));

    while let Some(frame) = timeout_at(deadline, framed.next())
        .await
        .map_err(|_| ConnectionError::Timeout(settings.read_timeout))?
    {
        let frame = frame?;
        summary.frames += 1;
        if let Some(ack) = acknowledgement_for(pipeline, &frame).await {
            framed.send(ack).await.map_err(|e| match e {
                CodecError::Io(e) => ConnectionError::Write(e),
                CodecError::Framing(e) => ConnectionError::Framing(e),
            })?;
            summary.acknowledged += 1;
        }
    }
    Ok(summary)
}

async fn acknowledgement_for(pipeline: &Pipeline, frame: &str) -> Option<Acknowledgement> {
    pipeline
        .process_frame(frame)
        .await
        .and_then(|report| report.acknowledgement)
}

/// Spawn a task serving `stream`, logging and discarding any panics.
pub(super) fn spawn_connection_task(
    stream: TcpStream,
    pipeline: std::sync::Arc<Pipeline>,
    settings: ConnectionSettings,
    tracker: &TaskTracker,
) {
    let peer_addr = match stream.peer_addr() {
        Ok(addr) => Some(addr),
        Err(error) => {
            tracing::warn!(%error, "failed to retrieve peer address");
            None
        }
    };
    let span = tracing::info_span!("connection", ?peer_addr);
    tracker.spawn(
        async move {
            tracing::info!("serving");
            crate::metrics::inc_connections();
            let fut = std::panic::AssertUnwindSafe(serve(stream, &pipeline, &settings, peer_addr))
                .catch_unwind();
            let outcome = fut.await;
            crate::metrics::dec_connections();

            if let Err(panic) = outcome {
                crate::metrics::inc_connection_panics();
                let panic_msg = crate::panic::format_panic(panic);
                tracing::error!(panic = %panic_msg, ?peer_addr, "connection task panicked");
            }
        }
        .instrument(span),
    );
}

async fn serve(
    stream: TcpStream,
    pipeline: &Pipeline,
    settings: &ConnectionSettings,
    peer_addr: Option<SocketAddr>,
) {
    match handle_connection(stream, pipeline, settings).await {
        Ok(summary) => tracing::debug!(
            frames = summary.frames,
            acknowledged = summary.acknowledged,
            "connection closed"
        ),
        Err(ConnectionError::Timeout(limit)) => {
            tracing::warn!(?limit, ?peer_addr, "read deadline expired");
        }
        Err(ConnectionError::Framing(error)) => {
            tracing::warn!(%error, ?peer_addr, "invalid message");
        }
        Err(error @ (ConnectionError::Read(_) | ConnectionError::Write(_))) => {
            crate::metrics::inc_errors();
            tracing::error!(%error, ?peer_addr, "connection error");
        }
    }
}
