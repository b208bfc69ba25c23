//! Framing for the `$`-terminated tracker protocol.
//!
//! A single TCP read may carry several frames back to back. Each frame is a
//! comma-separated list of elements whose first element names the report
//! type (`+RESP:GTFRI`), followed by the protocol version, the device
//! identifier, and finally a sequence count that the device expects to see
//! echoed in a `+SACK:<count>$` acknowledgement.

pub mod error;
mod message;

pub use error::{FramingError, MessageError};
pub use message::{Acknowledgement, Message};

/// Character terminating every frame on the wire.
pub const FRAME_TERMINATOR: char = '$';

/// Character separating elements within a frame.
pub const ELEMENT_SEPARATOR: char = ',';

/// Minimum number of elements a frame needs to carry a device identifier.
pub const MIN_ELEMENTS: usize = 3;

/// Split a raw read buffer into frame strings.
///
/// Surrounding whitespace is trimmed first. The buffer must end with
/// [`FRAME_TERMINATOR`]; partial frames are not recovered. The empty entry
/// produced by the final terminator is discarded, but empty frames between
/// two terminators are preserved so callers can report them.
///
/// Invalid UTF-8 is replaced rather than rejected so that one corrupt byte
/// does not discard the whole batch.
///
/// # Errors
///
/// Returns [`FramingError::Empty`] when the buffer holds only whitespace and
/// [`FramingError::Unterminated`] when it does not end with a terminator.
///
/// # Examples
///
/// ```
/// use trackwire::frame::split_frames;
///
/// let frames = split_frames(b"+RESP:GTFRI,01,865,7$+RESP:GTHBD,01,865,8$\r\n")
///     .expect("buffer is terminated");
/// assert_eq!(frames, ["+RESP:GTFRI,01,865,7", "+RESP:GTHBD,01,865,8"]);
/// ```
pub fn split_frames(buf: &[u8]) -> Result<Vec<String>, FramingError> {
    let text = String::from_utf8_lossy(buf);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FramingError::Empty);
    }
    let Some(body) = trimmed.strip_suffix(FRAME_TERMINATOR) else {
        return Err(FramingError::Unterminated {
            len: trimmed.len(),
        });
    };
    Ok(body.split(FRAME_TERMINATOR).map(str::to_owned).collect())
}
