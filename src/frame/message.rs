//! Parsed tracker messages and their acknowledgements.

use std::{fmt, str::FromStr};

use super::{ELEMENT_SEPARATOR, FRAME_TERMINATOR, MIN_ELEMENTS, error::MessageError};

/// One decoded tracker report.
///
/// The raw text is kept alongside the split elements because routing
/// conditions match against the whole frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    raw: String,
    elements: Vec<String>,
    kind: String,
    protocol_version: String,
    device_id: String,
    sequence_count: String,
}

impl Message {
    /// Parse a single frame (without its terminator).
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::TooFewElements`] when the frame has fewer than
    /// three elements and [`MessageError::MalformedHeader`] when the first
    /// element does not split on `:` into exactly two parts.
    ///
    /// # Examples
    ///
    /// ```
    /// use trackwire::frame::Message;
    ///
    /// let msg = Message::parse("+RESP:GTFRI,060100,865000,,42").expect("valid message");
    /// assert_eq!(msg.kind(), "GTFRI");
    /// assert_eq!(msg.protocol_version(), "060100");
    /// assert_eq!(msg.device_id(), "865000");
    /// assert_eq!(msg.sequence_count(), "42");
    /// ```
    pub fn parse(raw: impl Into<String>) -> Result<Self, MessageError> {
        let raw = raw.into();
        let elements: Vec<String> = raw.split(ELEMENT_SEPARATOR).map(str::to_owned).collect();
        if elements.len() < MIN_ELEMENTS {
            return Err(MessageError::TooFewElements {
                count: elements.len(),
                min: MIN_ELEMENTS,
            });
        }

        let header: Vec<&str> = elements[0].split(':').collect();
        let [_, kind] = header.as_slice() else {
            return Err(MessageError::MalformedHeader {
                header: elements[0].clone(),
            });
        };
        let kind = (*kind).to_owned();
        let protocol_version = elements[1].clone();
        let device_id = elements[2].clone();
        let sequence_count = elements.last().cloned().unwrap_or_default();

        Ok(Self {
            raw,
            elements,
            kind,
            protocol_version,
            device_id,
            sequence_count,
        })
    }

    /// The frame text as received, without the terminator.
    pub fn raw(&self) -> &str { &self.raw }

    /// Comma-separated elements in wire order.
    pub fn elements(&self) -> &[String] { &self.elements }

    /// Report type taken from the header, e.g. `GTFRI`.
    pub fn kind(&self) -> &str { &self.kind }

    /// Protocol version (element 1).
    pub fn protocol_version(&self) -> &str { &self.protocol_version }

    /// Device identifier (element 2).
    pub fn device_id(&self) -> &str { &self.device_id }

    /// Trailing sequence count; may be empty.
    pub fn sequence_count(&self) -> &str { &self.sequence_count }

    /// Acknowledgement owed to the device, if the frame carried a count.
    pub fn acknowledgement(&self) -> Option<Acknowledgement> {
        if self.sequence_count.is_empty() {
            None
        } else {
            Some(Acknowledgement::new(self.sequence_count.clone()))
        }
    }
}

impl FromStr for Message {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

/// `+SACK:<count>$` frame written back to a device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acknowledgement {
    count: String,
}

impl Acknowledgement {
    /// Acknowledge the given sequence count.
    #[must_use]
    pub fn new(count: impl Into<String>) -> Self {
        Self {
            count: count.into(),
        }
    }

    /// Sequence count being acknowledged.
    pub fn count(&self) -> &str { &self.count }

    /// Encode the acknowledgement for the wire.
    ///
    /// ```
    /// use trackwire::frame::Acknowledgement;
    ///
    /// assert_eq!(Acknowledgement::new("42").to_bytes(), b"+SACK:42$");
    /// ```
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> { self.to_string().into_bytes() }
}

impl fmt::Display for Acknowledgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+SACK:{}{FRAME_TERMINATOR}", self.count)
    }
}
