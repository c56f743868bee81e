//! Inbound response frames
//!
//! Wire form: `data SW1 SW2`, followed by a little-endian CRC-16 when the
//! transport asks for link checksums.

pub mod error;
pub mod status;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

pub use error::FrameError;
pub use status::{StatusKind, StatusWord};

use crate::{
    checksum::{append_checksum, strip_checksum},
    encryption::{self, SessionKeyBytes},
    tlv::{DecodeError, TlvSet},
};

/// Parsed card response
#[derive(Clone, PartialEq, Eq)]
pub struct ResponseApdu {
    data: Bytes,
    status: StatusWord,
}

impl ResponseApdu {
    /// Create a response from payload and status
    pub const fn new(data: Bytes, status: StatusWord) -> Self {
        Self { data, status }
    }

    /// Create a `90 00` response
    pub const fn success(data: Bytes) -> Self {
        Self::new(data, status::common::SW_PROCESS_COMPLETED)
    }

    /// Status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Payload
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Whether the status word reports success
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the payload as TLV
    pub fn tlv(&self) -> Result<TlvSet, DecodeError> {
        TlvSet::decode(&self.data)
    }

    /// Parse `data SW1 SW2`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        let Some(split) = bytes.len().checked_sub(2) else {
            return Err(FrameError::Malformed {
                length: bytes.len(),
            });
        };
        let (data, sw) = bytes.split_at(split);
        Ok(Self {
            data: Bytes::copy_from_slice(data),
            status: StatusWord::new(sw[0], sw[1]),
        })
    }

    /// Parse a frame, verifying and stripping the checksum when present
    pub fn from_frame(frame: &[u8], checksum: bool) -> Result<Self, FrameError> {
        if checksum {
            Self::from_bytes(strip_checksum(frame)?)
        } else {
            Self::from_bytes(frame)
        }
    }

    /// Serialize to `data SW1 SW2`
    pub fn to_bytes(&self) -> Bytes {
        self.to_frame(false)
    }

    /// Serialize, appending the link checksum when requested
    pub fn to_frame(&self, checksum: bool) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.data.len() + 4);
        buf.put_slice(&self.data);
        buf.put_u8(self.status.sw1);
        buf.put_u8(self.status.sw2);
        if checksum {
            append_checksum(&mut buf);
        }
        buf.freeze()
    }

    /// Decrypt the payload; an empty payload is returned untouched
    pub fn decrypt(self, key: &SessionKeyBytes) -> Result<Self, FrameError> {
        if self.data.is_empty() {
            return Ok(self);
        }
        Ok(Self {
            data: encryption::decrypt(key, &self.data)?,
            status: self.status,
        })
    }

    /// Encrypt the payload; an empty payload is returned untouched
    pub fn encrypt(self, key: &SessionKeyBytes) -> Result<Self, FrameError> {
        if self.data.is_empty() {
            return Ok(self);
        }
        Ok(Self {
            data: encryption::encrypt(key, &self.data)?,
            status: self.status,
        })
    }
}

impl fmt::Debug for ResponseApdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseApdu")
            .field("status", &format_args!("{}", self.status))
            .field("data", &hex::encode(&self.data))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::{Tag, TlvBuilder};

    #[test]
    fn test_parse_status_only() {
        let response = ResponseApdu::from_bytes(&[0x97, 0x89]).unwrap();
        assert!(response.data().is_empty());
        assert_eq!(response.status().kind(), StatusKind::NeedsSecurityDelay);
        assert!(ResponseApdu::from_bytes(&[0x90]).is_err());
    }

    #[test]
    fn test_frame_roundtrip_with_tlv() {
        let payload = TlvBuilder::new()
            .append(Tag::Status, 1u8)
            .serialize()
            .unwrap();
        let response = ResponseApdu::success(payload);
        let frame = response.to_frame(true);

        let parsed = ResponseApdu::from_frame(&frame, true).unwrap();
        assert!(parsed.is_success());
        assert_eq!(parsed.tlv().unwrap().value::<u8>(Tag::Status).unwrap(), 1);
    }

    #[test]
    fn test_checksum_failure_is_transient() {
        let mut frame = ResponseApdu::success(Bytes::from_static(&[1, 2, 3]))
            .to_frame(true)
            .to_vec();
        frame[1] ^= 0x40;
        let err = ResponseApdu::from_frame(&frame, true).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_encrypted_payload() {
        let key = [3u8; 32];
        let response = ResponseApdu::success(Bytes::from_static(b"card data"));
        let encrypted = response.clone().encrypt(&key).unwrap();
        assert_ne!(encrypted.data(), response.data());
        assert_eq!(encrypted.decrypt(&key).unwrap(), response);
    }
}
