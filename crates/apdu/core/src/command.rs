//! Outbound command frames
//!
//! Commands always use the extended-length case 4 layout:
//! `CLA INS P1 P2 00 Lc_hi Lc_lo data 00 00`. A command without payload is
//! sent as `CLA INS P1 P2 00 00 00`.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use derive_more::Display;

use crate::{
    checksum::{append_checksum, strip_checksum},
    encryption::{self, EncryptionMode, SessionKeyBytes},
    response::FrameError,
    tlv::{EncodeError, MAX_VALUE_LENGTH, Tlv, TlvSet, encode},
};

/// Class byte used by every command
pub const CLA: u8 = 0x00;

/// Instruction byte of a card command
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Read card information
    Read,
    /// Write issuer data, or issuer extra data when a Mode tag is present
    WriteIssuerData,
    /// Read issuer data, or issuer extra data when a Mode tag is present
    ReadIssuerData,
    /// Create the wallet key
    CreateWallet,
    /// Prove possession of the wallet key
    CheckWallet,
    /// Sign hashes
    Sign,
    /// Destroy the wallet key
    PurgeWallet,
    /// Negotiate an encrypted session
    OpenSession,
}

impl Instruction {
    /// INS byte
    pub const fn code(self) -> u8 {
        match self {
            Self::Read => 0xF2,
            Self::WriteIssuerData => 0xF0,
            Self::ReadIssuerData => 0xF1,
            Self::CreateWallet => 0xF8,
            Self::CheckWallet => 0xF9,
            Self::Sign => 0xFB,
            Self::PurgeWallet => 0xFC,
            Self::OpenSession => 0xFF,
        }
    }

    /// Instruction for an INS byte
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0xF2 => Some(Self::Read),
            0xF0 => Some(Self::WriteIssuerData),
            0xF1 => Some(Self::ReadIssuerData),
            0xF8 => Some(Self::CreateWallet),
            0xF9 => Some(Self::CheckWallet),
            0xFB => Some(Self::Sign),
            0xFC => Some(Self::PurgeWallet),
            0xFF => Some(Self::OpenSession),
            _ => None,
        }
    }
}

/// Immutable outbound command
#[derive(Clone, PartialEq, Eq)]
pub struct CommandApdu {
    instruction: Instruction,
    p1: u8,
    p2: u8,
    data: Bytes,
}

impl CommandApdu {
    /// Create a command with a raw payload and P1 = 0
    pub const fn new(instruction: Instruction, data: Bytes) -> Self {
        Self {
            instruction,
            p1: 0x00,
            p2: 0x00,
            data,
        }
    }

    /// Create a command whose payload is the encoding of `records`
    pub fn from_tlv(instruction: Instruction, records: &[Tlv]) -> Result<Self, EncodeError> {
        let data = encode(records)?;
        if data.len() > MAX_VALUE_LENGTH {
            return Err(EncodeError::PayloadTooLong { length: data.len() });
        }
        Ok(Self::new(instruction, data))
    }

    /// Set P1
    pub const fn with_p1(mut self, p1: u8) -> Self {
        self.p1 = p1;
        self
    }

    /// Instruction
    pub const fn instruction(&self) -> Instruction {
        self.instruction
    }

    /// First parameter, the encryption mode on this card family
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Second parameter
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Payload
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Encryption mode announced in P1
    pub const fn encryption_mode(&self) -> Option<EncryptionMode> {
        EncryptionMode::from_code(self.p1)
    }

    /// Decode the payload as TLV
    pub fn tlv(&self) -> Result<TlvSet, crate::tlv::DecodeError> {
        TlvSet::decode(&self.data)
    }

    /// Encrypt the payload and announce `mode` in P1
    ///
    /// An empty payload stays empty.
    pub fn encrypt(
        &self,
        mode: EncryptionMode,
        key: &SessionKeyBytes,
    ) -> Result<Self, FrameError> {
        let data = if self.data.is_empty() {
            Bytes::new()
        } else {
            encryption::encrypt(key, &self.data)?
        };
        Ok(Self {
            data,
            ..self.clone()
        }
        .with_p1(mode.code()))
    }

    /// Decrypt the payload, leaving P1 untouched
    pub fn decrypt(&self, key: &SessionKeyBytes) -> Result<Self, FrameError> {
        let data = if self.data.is_empty() {
            Bytes::new()
        } else {
            encryption::decrypt(key, &self.data)?
        };
        Ok(Self {
            data,
            ..self.clone()
        })
    }

    /// Serialize to the extended-length wire form
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(9 + self.data.len());
        self.write_into(&mut buf);
        buf.freeze()
    }

    /// Serialize, appending the link checksum when requested
    pub fn to_frame(&self, checksum: bool) -> Bytes {
        let mut buf = BytesMut::with_capacity(11 + self.data.len());
        self.write_into(&mut buf);
        if checksum {
            append_checksum(&mut buf);
        }
        buf.freeze()
    }

    fn write_into(&self, buf: &mut BytesMut) {
        buf.put_u8(CLA);
        buf.put_u8(self.instruction.code());
        buf.put_u8(self.p1);
        buf.put_u8(self.p2);
        buf.put_u8(0x00);
        if self.data.is_empty() {
            buf.put_u16(0x0000);
        } else {
            buf.put_u16(self.data.len() as u16);
            buf.put_slice(&self.data);
            buf.put_u16(0x0000);
        }
    }

    /// Parse the wire form produced by [`CommandApdu::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        let malformed = FrameError::Malformed {
            length: bytes.len(),
        };
        if bytes.len() < 7 || bytes[0] != CLA || bytes[4] != 0x00 {
            return Err(malformed);
        }
        let instruction =
            Instruction::from_code(bytes[1]).ok_or(FrameError::UnknownInstruction(bytes[1]))?;

        let lc = u16::from_be_bytes([bytes[5], bytes[6]]) as usize;
        let data = match bytes.len() {
            7 if lc == 0 => Bytes::new(),
            len if len == 7 + lc + 2 => Bytes::copy_from_slice(&bytes[7..7 + lc]),
            _ => return Err(malformed),
        };

        Ok(Self {
            instruction,
            p1: bytes[2],
            p2: bytes[3],
            data,
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
}

impl fmt::Debug for CommandApdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandApdu")
            .field("instruction", &self.instruction)
            .field("p1", &format_args!("{:#04x}", self.p1))
            .field("data", &hex::encode(&self.data))
            .finish()
    }
}
