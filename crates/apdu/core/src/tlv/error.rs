//! Error types for the TLV codec

use super::Tag;

/// Failure while encoding a TLV sequence
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// Value does not fit the three-byte length form
    #[error("value for {tag} is {length} bytes, the limit is 65535")]
    ValueTooLong {
        /// Offending tag
        tag: Tag,
        /// Length of the value
        length: usize,
    },

    /// Encoded payload does not fit a single command
    #[error("payload is {length} bytes, the limit is 65535")]
    PayloadTooLong {
        /// Encoded payload length
        length: usize,
    },
}

/// Failure while decoding a TLV byte stream
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Stream ended inside a tag/length header
    #[error("header for {tag} truncated at offset {offset}")]
    TruncatedHeader {
        /// Tag whose header was cut
        tag: Tag,
        /// Offset of the tag byte
        offset: usize,
    },

    /// Declared length runs past the end of the stream
    #[error("{tag} declares {declared} bytes but only {remaining} remain")]
    TruncatedRecord {
        /// Tag of the truncated record
        tag: Tag,
        /// Length from the header
        declared: usize,
        /// Bytes left in the stream
        remaining: usize,
    },
}

/// Failure projecting a decoded TLV set onto typed values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TlvError {
    /// Required tag not present
    #[error("missing tag {0}")]
    MissingTag(Tag),

    /// Tag present but its value cannot be read as the requested type
    #[error("{tag} cannot be read as {expected} ({length} bytes)")]
    TypeMismatch {
        /// Offending tag
        tag: Tag,
        /// Name of the expected type
        expected: &'static str,
        /// Actual value length
        length: usize,
    },
}

impl TlvError {
    /// The single tag this error refers to
    pub const fn tag(&self) -> Tag {
        match self {
            Self::MissingTag(tag) | Self::TypeMismatch { tag, .. } => *tag,
        }
    }
}
