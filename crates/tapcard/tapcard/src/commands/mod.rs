//! Card commands
//!
//! Each command turns typed parameters plus the session environment into a
//! [`CommandApdu`] and interprets the matching [`ResponseApdu`]. Commands are
//! plain values; the session owns encryption, retries and timing.

mod check_wallet;
mod create_wallet;
mod issuer_data;
mod issuer_extra_data;
mod open_session;
mod purge_wallet;
mod read;
mod sign;

pub use check_wallet::{CheckWalletCommand, CheckWalletResponse};
pub use create_wallet::{CreateWalletCommand, CreateWalletResponse};
pub use issuer_data::{
    ReadIssuerDataCommand, ReadIssuerDataResponse, WriteIssuerDataCommand,
    WriteIssuerDataResponse,
};
pub use issuer_extra_data::{
    ExtraDataWriteStep, IssuerExtraDataChunk, ReadIssuerExtraDataCommand,
    WriteIssuerExtraDataCommand,
};
pub use open_session::{OpenSessionCommand, OpenSessionResponse};
pub use purge_wallet::{PurgeWalletCommand, PurgeWalletResponse};
pub use read::ReadCommand;
pub use sign::{MAX_HASHES, SignCommand, SignResponse};
pub(crate) use sign::validate_hashes;

use tapcard_apdu_core::{CommandApdu, Instruction, ResponseApdu, TlvBuilder, TlvSet};

use crate::{environment::CardEnvironment, error::CommandError};

/// Largest standard issuer data blob
pub const MAX_ISSUER_DATA_LEN: usize = 512;

/// Chunk size for issuer extra data transfers
pub const EXTRA_DATA_CHUNK_LEN: usize = 512;

mod private {
    /// Keeps command implementations inside this crate
    pub trait Sealed {}
}

pub(crate) use private::Sealed;

/// A typed card command
pub trait CardCommand: Sealed + Send + Sync {
    /// Parsed success response
    type Response: Send;

    /// Step name used in logs and errors
    fn name(&self) -> &'static str;

    /// Instruction byte
    fn instruction(&self) -> Instruction;

    /// Build the plaintext command
    fn serialize(&self, environment: &CardEnvironment) -> Result<CommandApdu, CommandError>;

    /// Interpret a response to this command
    fn deserialize(
        &self,
        environment: &CardEnvironment,
        response: ResponseApdu,
    ) -> Result<Self::Response, CommandError>;
}

/// Encode `builder` as the payload of `instruction`
pub(crate) fn build(
    instruction: Instruction,
    builder: TlvBuilder,
) -> Result<CommandApdu, CommandError> {
    Ok(CommandApdu::from_tlv(instruction, builder.records())?)
}

/// Decode the payload of a successful response
pub(crate) fn success_payload(response: &ResponseApdu) -> Result<TlvSet, CommandError> {
    if !response.is_success() {
        return Err(CommandError::UnexpectedStatus(response.status()));
    }
    Ok(response.tlv()?)
}

#[cfg(test)]
pub(crate) mod tests {
    use bytes::Bytes;
    use tapcard_apdu_core::{Tag, Tlv, tlv::encode};

    use crate::types::CardId;

    pub(crate) fn card_id() -> CardId {
        CardId::from_bytes(Bytes::from_static(&[0xCB, 0x79, 0, 0, 0, 0, 0x01, 0x42]))
    }

    pub(crate) fn tags(records: &[Tlv]) -> Vec<Tag> {
        records.iter().map(Tlv::tag).collect()
    }

    pub(crate) fn payload(records: &[Tlv]) -> Bytes {
        encode(records).unwrap()
    }
}
