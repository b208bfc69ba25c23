//! Error types for the framing layer.
//!
//! - [`FramingError`]: the read buffer (or stream) could not be cut into frames. The whole buffer
//!   is dropped.
//! - [`MessageError`]: a single frame was cut out but is not a usable message. Only that frame is
//!   skipped.

use thiserror::Error;

/// Errors raised while splitting raw bytes into frames.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// The buffer contained nothing but whitespace.
    #[error("empty read buffer")]
    Empty,

    /// The buffer did not end with the frame terminator.
    #[error("buffer of {len} bytes is not terminated with '$'")]
    Unterminated {
        /// Length of the trimmed buffer.
        len: usize,
    },

    /// No terminator was found within the permitted frame length.
    #[error("frame exceeds max length: {size} > {max}")]
    FrameTooLong {
        /// Bytes buffered without finding a terminator.
        size: usize,
        /// Maximum permitted frame length.
        max: usize,
    },
}

/// Errors raised while interpreting a single frame.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    /// The frame carried fewer elements than the header requires.
    #[error("message has {count} elements, need at least {min}")]
    TooFewElements {
        /// Number of elements found.
        count: usize,
        /// Minimum number of elements required.
        min: usize,
    },

    /// The first element was not of the form `PREFIX:TYPE`.
    #[error("unknown message type: {header}")]
    MalformedHeader {
        /// The offending header element.
        header: String,
    },
}
