//! Wire layer for contactless wallet cards
//!
//! This crate provides the foundational types for talking to a wallet card:
//!
//! - a flat TLV codec with the firmware's tag space ([`tlv`])
//! - extended-length command frames and response frames with status words
//! - the CRC-16 link checksum and the session payload encryption
//! - the async [`CardTransport`] trait implemented by reader back-ends
//!
//! Nothing here knows about PINs, wallets or sessions; those live in the
//! `tapcard` crate.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod checksum;
pub mod command;
pub mod encryption;
pub mod response;
pub mod tlv;
pub mod transport;

pub use command::{CommandApdu, Instruction};
pub use encryption::{EncryptionMode, SessionKeyBytes};
pub use response::{FrameError, ResponseApdu, StatusKind, StatusWord};
pub use tlv::{Tag, Tlv, TlvBuilder, TlvSet};
pub use transport::{CardTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{Bytes, BytesMut};

    pub use crate::command::{CommandApdu, Instruction};
    pub use crate::encryption::EncryptionMode;
    pub use crate::response::status::{StatusKind, StatusWord, common as status};
    pub use crate::response::{FrameError, ResponseApdu};
    pub use crate::tlv::{
        DecodeError, EncodeError, FromTlvValue, IntoTlvValue, Tag, Tlv, TlvBuilder, TlvError,
        TlvSet,
    };
    pub use crate::transport::{CardTransport, TransportError};
}
