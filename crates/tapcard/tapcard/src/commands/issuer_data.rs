use bytes::Bytes;
use tapcard_apdu_core::{CommandApdu, Instruction, ResponseApdu, Tag};

use super::{CardCommand, MAX_ISSUER_DATA_LEN, Sealed, build, success_payload};
use crate::{
    crypto::{self, issuer_data_message},
    environment::CardEnvironment,
    error::CommandError,
    types::{CardId, EllipticCurve},
};

/// READ_ISSUER_DATA: the issuer's signed data blob
#[derive(Debug, Clone)]
pub struct ReadIssuerDataCommand {
    card_id: CardId,
}

impl ReadIssuerDataCommand {
    /// Read the issuer data of `card_id`
    pub const fn new(card_id: CardId) -> Self {
        Self { card_id }
    }
}

/// Result of READ_ISSUER_DATA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadIssuerDataResponse {
    /// Card that answered
    pub card_id: CardId,
    /// Issuer data
    pub issuer_data: Bytes,
    /// Issuer signature over the data
    pub issuer_data_signature: Bytes,
    /// Replay counter, when the card keeps one
    pub issuer_data_counter: Option<u32>,
}

impl ReadIssuerDataResponse {
    /// Verify the signature over `card_id || data || counter?`
    pub fn verify(&self, issuer_public_key: &[u8]) -> bool {
        let message = issuer_data_message(
            self.card_id.as_bytes(),
            &self.issuer_data,
            self.issuer_data_counter,
        );
        crypto::verify(
            EllipticCurve::Secp256k1,
            issuer_public_key,
            &message,
            &self.issuer_data_signature,
        )
    }
}

impl Sealed for ReadIssuerDataCommand {}

impl CardCommand for ReadIssuerDataCommand {
    type Response = ReadIssuerDataResponse;

    fn name(&self) -> &'static str {
        "read_issuer_data"
    }

    fn instruction(&self) -> Instruction {
        Instruction::ReadIssuerData
    }

    fn serialize(&self, environment: &CardEnvironment) -> Result<CommandApdu, CommandError> {
        let builder = environment
            .tlv_builder()
            .append(Tag::Pin, environment.pin1().as_bytes())
            .append(Tag::CardId, &self.card_id);
        build(self.instruction(), builder)
    }

    fn deserialize(
        &self,
        _environment: &CardEnvironment,
        response: ResponseApdu,
    ) -> Result<Self::Response, CommandError> {
        let tlv = success_payload(&response)?;
        Ok(ReadIssuerDataResponse {
            card_id: tlv.value(Tag::CardId)?,
            issuer_data: tlv.value(Tag::IssuerData)?,
            issuer_data_signature: tlv.value(Tag::IssuerDataSignature)?,
            issuer_data_counter: tlv.optional(Tag::IssuerDataCounter)?,
        })
    }
}

/// WRITE_ISSUER_DATA: replace the issuer data blob
#[derive(Debug, Clone)]
pub struct WriteIssuerDataCommand {
    card_id: CardId,
    issuer_data: Bytes,
    issuer_data_signature: Bytes,
    issuer_data_counter: Option<u32>,
}

impl WriteIssuerDataCommand {
    /// Validate and build the command
    pub fn new(
        card_id: CardId,
        issuer_data: Bytes,
        issuer_data_signature: Bytes,
        issuer_data_counter: Option<u32>,
    ) -> Result<Self, CommandError> {
        if issuer_data.len() > MAX_ISSUER_DATA_LEN {
            return Err(CommandError::InvalidParameters(format!(
                "issuer data is {} bytes, at most {MAX_ISSUER_DATA_LEN} allowed",
                issuer_data.len()
            )));
        }
        if issuer_data_signature.is_empty() {
            return Err(CommandError::InvalidParameters(
                "issuer data signature is empty".into(),
            ));
        }
        Ok(Self {
            card_id,
            issuer_data,
            issuer_data_signature,
            issuer_data_counter,
        })
    }

    /// Card the data is written to
    pub const fn card_id(&self) -> &CardId {
        &self.card_id
    }

    /// Replay counter sent with the data
    pub const fn issuer_data_counter(&self) -> Option<u32> {
        self.issuer_data_counter
    }

    /// Check the issuer signature before it reaches the card
    pub fn verify(&self, issuer_public_key: &[u8]) -> bool {
        let message = issuer_data_message(
            self.card_id.as_bytes(),
            &self.issuer_data,
            self.issuer_data_counter,
        );
        crypto::verify(
            EllipticCurve::Secp256k1,
            issuer_public_key,
            &message,
            &self.issuer_data_signature,
        )
    }
}

/// Result of the issuer data writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteIssuerDataResponse {
    /// Card that answered
    pub card_id: CardId,
}

impl Sealed for WriteIssuerDataCommand {}

impl CardCommand for WriteIssuerDataCommand {
    type Response = WriteIssuerDataResponse;

    fn name(&self) -> &'static str {
        "write_issuer_data"
    }

    fn instruction(&self) -> Instruction {
        Instruction::WriteIssuerData
    }

    fn serialize(&self, environment: &CardEnvironment) -> Result<CommandApdu, CommandError> {
        let builder = environment
            .tlv_builder()
            .append(Tag::Pin, environment.pin1().as_bytes())
            .append(Tag::CardId, &self.card_id)
            .append(Tag::IssuerData, &self.issuer_data)
            .append(Tag::IssuerDataSignature, &self.issuer_data_signature)
            .append_optional(Tag::IssuerDataCounter, self.issuer_data_counter);
        build(self.instruction(), builder)
    }

    fn deserialize(
        &self,
        _environment: &CardEnvironment,
        response: ResponseApdu,
    ) -> Result<Self::Response, CommandError> {
        let tlv = success_payload(&response)?;
        Ok(WriteIssuerDataResponse {
            card_id: tlv.value(Tag::CardId)?,
        })
    }
}
