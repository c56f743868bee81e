//! Flat tag-length-value codec used by the card firmware
//!
//! Every record is a one-byte tag followed by a length and the value. The
//! length is a single byte for values shorter than `0xFF`; longer values use
//! the marker `0xFF` followed by a big-endian `u16`. This is not BER-TLV:
//! tags never span several bytes and there is no constructed bit.

mod builder;
mod error;
mod set;
mod tag;
mod value;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

pub use builder::TlvBuilder;
pub use error::{DecodeError, EncodeError, TlvError};
pub use set::TlvSet;
pub use tag::Tag;
pub use value::{FromTlvValue, IntoTlvValue};

/// Length byte announcing the three-byte length form
pub const EXTENDED_LENGTH_MARKER: u8 = 0xFF;

/// Largest value a single record can carry
pub const MAX_VALUE_LENGTH: usize = u16::MAX as usize;

/// A single tag-length-value record
#[derive(Clone, PartialEq, Eq)]
pub struct Tlv {
    tag: Tag,
    value: Bytes,
}

impl Tlv {
    /// Create a record from a tag and raw value
    pub fn new(tag: Tag, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Record tag
    pub const fn tag(&self) -> Tag {
        self.tag
    }

    /// Raw value bytes
    pub const fn value(&self) -> &Bytes {
        &self.value
    }

    /// Number of bytes this record takes on the wire
    pub const fn encoded_len(&self) -> usize {
        let header = if self.value.len() < EXTENDED_LENGTH_MARKER as usize {
            2
        } else {
            4
        };
        header + self.value.len()
    }

    /// Append the wire form of this record to `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let length = self.value.len();
        if length > MAX_VALUE_LENGTH {
            return Err(EncodeError::ValueTooLong {
                tag: self.tag,
                length,
            });
        }

        buf.put_u8(self.tag.code());
        if length < EXTENDED_LENGTH_MARKER as usize {
            buf.put_u8(length as u8);
        } else {
            buf.put_u8(EXTENDED_LENGTH_MARKER);
            buf.put_u16(length as u16);
        }
        buf.put_slice(&self.value);
        Ok(())
    }
}

impl fmt::Debug for Tlv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.tag, hex::encode(&self.value))
    }
}

/// Encode a sequence of records, preserving their order
pub fn encode(records: &[Tlv]) -> Result<Bytes, EncodeError> {
    let capacity = records.iter().map(Tlv::encoded_len).sum();
    let mut buf = BytesMut::with_capacity(capacity);
    for record in records {
        record.encode_into(&mut buf)?;
    }
    Ok(buf.freeze())
}

/// Decode a byte stream into records in a single forward pass
///
/// Unknown tags are kept as [`Tag::Unknown`]. An empty stream yields an empty
/// sequence.
pub fn decode(bytes: &[u8]) -> Result<Vec<Tlv>, DecodeError> {
    let mut records = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let offset = pos;
        let tag = Tag::from_code(bytes[pos]);
        pos += 1;

        let truncated = DecodeError::TruncatedHeader { tag, offset };
        let first = *bytes.get(pos).ok_or_else(|| truncated.clone())?;
        pos += 1;

        let declared = if first == EXTENDED_LENGTH_MARKER {
            let length = bytes.get(pos..pos + 2).ok_or(truncated)?;
            pos += 2;
            u16::from_be_bytes([length[0], length[1]]) as usize
        } else {
            first as usize
        };

        let remaining = bytes.len() - pos;
        if declared > remaining {
            return Err(DecodeError::TruncatedRecord {
                tag,
                declared,
                remaining,
            });
        }

        if !tag.is_known() {
            trace!(tag = %tag, length = declared, "Skipping over unknown tag");
        }

        records.push(Tlv::new(
            tag,
            Bytes::copy_from_slice(&bytes[pos..pos + declared]),
        ));
        pos += declared;
    }

    Ok(records)
}
