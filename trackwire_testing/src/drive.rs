//! Drive a connection handler over an in-memory stream.

use std::io;

use futures::FutureExt as _;
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};
use trackwire::{
    pipeline::Pipeline,
    server::{ConnectionError, ConnectionSettings, ConnectionSummary, handle_connection},
};

const DEFAULT_CAPACITY: usize = 4096;

/// What the device saw and how the handler finished.
#[derive(Debug)]
pub struct DriveOutcome {
    /// Bytes written back to the device.
    pub output: Vec<u8>,
    pub result: Result<ConnectionSummary, ConnectionError>,
}

impl DriveOutcome {
    /// Output decoded as UTF-8, lossily.
    #[must_use]
    pub fn output_text(&self) -> String { String::from_utf8_lossy(&self.output).into_owned() }
}

/// Write each chunk to the client half of a duplex stream, close it, and run
/// [`handle_connection`] on the server half.
///
/// Chunks are written back to back, so a reader may see them coalesced.
///
/// # Errors
///
/// Returns an `io::Error` if the client side fails, or if the handler panics;
/// the panic message is surfaced with the prefix `"server task failed"`.
pub async fn drive_connection(
    pipeline: &Pipeline,
    settings: &ConnectionSettings,
    chunks: Vec<Vec<u8>>,
) -> io::Result<DriveOutcome> {
    let (mut client, server) = duplex(DEFAULT_CAPACITY);

    let server_fut = async {
        std::panic::AssertUnwindSafe(handle_connection(server, pipeline, settings))
            .catch_unwind()
            .await
            .map_err(|panic| {
                let panic_msg = trackwire::panic::format_panic(panic);
                io::Error::other(format!("server task failed: {panic_msg}"))
            })
    };

    let client_fut = async {
        for chunk in &chunks {
            client.write_all(chunk).await?;
        }
        client.shutdown().await?;

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await?;
        io::Result::Ok(buf)
    };

    let (result, output) = tokio::try_join!(server_fut, client_fut)?;
    Ok(DriveOutcome { output, result })
}
