//! Streaming codec for the `$`-terminated tracker protocol.
//!
//! [`split_frames`](crate::frame::split_frames) assumes a whole batch arrives
//! in one read. [`TrackerCodec`] instead buffers partial frames across reads,
//! yielding each frame as soon as its terminator arrives. It is used when the
//! server runs in [`ReadMode::Stream`](crate::config::ReadMode::Stream).
//!
//! Frames carry the same text `split_frames` would produce for the whole
//! stream: whitespace before the first frame is dropped, whitespace between
//! frames stays part of the following frame, and empty frames are yielded.

use std::io;

use bytes::BytesMut;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{Acknowledgement, FramingError};

/// Minimum frame length in bytes.
///
/// Lengths passed to [`TrackerCodec::new`] are clamped to at least this value.
pub const MIN_FRAME_LENGTH: usize = 64;

/// Maximum frame length in bytes (1 MiB).
pub const MAX_FRAME_LENGTH: usize = 1024 * 1024;

const TERMINATOR: u8 = b'$';

/// Errors surfaced by [`TrackerCodec`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// The byte stream could not be cut into frames.
    #[error(transparent)]
    Framing(#[from] FramingError),
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

/// Splits a byte stream on `$` and encodes acknowledgements.
#[derive(Clone, Debug)]
pub struct TrackerCodec {
    max_frame_length: usize,
    // Bytes already scanned for a terminator.
    scanned: usize,
    // Set once the first frame has been yielded.
    started: bool,
}

impl TrackerCodec {
    /// Construct a codec that rejects frames longer than `max_frame_length`.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length: max_frame_length.clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH),
            scanned: 0,
            started: false,
        }
    }

    /// Return the maximum frame length accepted by this codec.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }
}

impl Default for TrackerCodec {
    fn default() -> Self { Self::new(1600) }
}

impl Decoder for TrackerCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let unscanned = src.get(self.scanned..).unwrap_or_default();
        let Some(offset) = unscanned.iter().position(|b| *b == TERMINATOR) else {
            if src.len() > self.max_frame_length {
                return Err(FramingError::FrameTooLong {
                    size: src.len(),
                    max: self.max_frame_length,
                }
                .into());
            }
            self.scanned = src.len();
            return Ok(None);
        };

        let end = self.scanned + offset;
        let frame = src.split_to(end + 1);
        self.scanned = 0;
        let body = String::from_utf8_lossy(frame.get(..end).unwrap_or_default());
        let text = if self.started {
            body.as_ref()
        } else {
            body.trim_start()
        };
        let text = text.to_owned();
        self.started = true;
        Ok(Some(text))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        // Trailing whitespace after the last terminator is a clean close.
        let leftover = src.split();
        self.scanned = 0;
        if leftover.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        tracing::debug!(
            bytes = leftover.len(),
            "unterminated bytes at EOF, discarding partial frame"
        );
        Err(FramingError::Unterminated {
            len: leftover.len(),
        }
        .into())
    }
}

impl Encoder<Acknowledgement> for TrackerCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Acknowledgement, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(item.to_string().as_bytes());
        Ok(())
    }
}
