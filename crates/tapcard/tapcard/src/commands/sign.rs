use bytes::{Bytes, BytesMut};
use tapcard_apdu_core::{CommandApdu, Instruction, ResponseApdu, Tag};

use super::{CardCommand, Sealed, build, success_payload};
use crate::{environment::CardEnvironment, error::CommandError, types::CardId};

/// Most hashes a single SIGN may carry
pub const MAX_HASHES: usize = 10;

const SIGNATURE_LEN: usize = 64;

/// SIGN: sign up to ten equal-length hashes with the wallet key
#[derive(Debug, Clone)]
pub struct SignCommand {
    card_id: CardId,
    hashes: Vec<Bytes>,
}

impl SignCommand {
    /// Validate the hashes and build the command
    pub fn new(card_id: CardId, hashes: Vec<Bytes>) -> Result<Self, CommandError> {
        validate_hashes(&hashes)?;
        Ok(Self { card_id, hashes })
    }

    /// Hashes in request order
    pub fn hashes(&self) -> &[Bytes] {
        &self.hashes
    }

    fn hash_size(&self) -> u8 {
        // Bounded by `new`
        self.hashes.first().map_or(0, |h| h.len() as u8)
    }
}

/// Check that `hashes` holds 1..=10 non-empty hashes of one length
pub(crate) fn validate_hashes(hashes: &[Bytes]) -> Result<(), CommandError> {
    let Some(first) = hashes.first() else {
        return Err(CommandError::InvalidParameters("no hashes to sign".into()));
    };
    if hashes.len() > MAX_HASHES {
        return Err(CommandError::InvalidParameters(format!(
            "{} hashes, at most {MAX_HASHES} allowed",
            hashes.len()
        )));
    }
    let size = first.len();
    if size == 0 || size > u8::MAX as usize {
        return Err(CommandError::InvalidParameters(format!(
            "hash size {size} out of range"
        )));
    }
    if hashes.iter().any(|h| h.len() != size) {
        return Err(CommandError::InvalidParameters(
            "hashes differ in length".into(),
        ));
    }
    Ok(())
}

/// Result of SIGN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignResponse {
    /// Card that answered
    pub card_id: CardId,
    /// One 64-byte signature per hash, in input order
    pub signatures: Vec<Bytes>,
    /// Signatures the wallet can still make
    pub remaining_signatures: u32,
    /// Hashes signed by the wallet so far
    pub signed_hashes: Option<u32>,
}

impl Sealed for SignCommand {}

impl CardCommand for SignCommand {
    type Response = SignResponse;

    fn name(&self) -> &'static str {
        "sign"
    }

    fn instruction(&self) -> Instruction {
        Instruction::Sign
    }

    fn serialize(&self, environment: &CardEnvironment) -> Result<CommandApdu, CommandError> {
        let concatenated = self
            .hashes
            .iter()
            .fold(BytesMut::new(), |mut buf, hash| {
                buf.extend_from_slice(hash);
                buf
            })
            .freeze();
        let builder = environment
            .tlv_builder()
            .append(Tag::Pin, environment.pin1().as_bytes())
            .append(Tag::CardId, &self.card_id)
            .append(Tag::Pin2, environment.pin2().as_bytes())
            .append(Tag::TransactionOutHashSize, self.hash_size())
            .append(Tag::TransactionOutHash, concatenated);
        build(self.instruction(), builder)
    }

    fn deserialize(
        &self,
        _environment: &CardEnvironment,
        response: ResponseApdu,
    ) -> Result<Self::Response, CommandError> {
        let tlv = success_payload(&response)?;
        let signature: Bytes = tlv.value(Tag::WalletSignature)?;
        if signature.len() != SIGNATURE_LEN * self.hashes.len() {
            return Err(CommandError::TypeMismatch {
                tag: Tag::WalletSignature,
                expected: "one 64-byte signature per hash",
                length: signature.len(),
            });
        }
        let signatures = (0..self.hashes.len())
            .map(|i| signature.slice(i * SIGNATURE_LEN..(i + 1) * SIGNATURE_LEN))
            .collect();

        Ok(SignResponse {
            card_id: tlv.value(Tag::CardId)?,
            signatures,
            remaining_signatures: tlv.value(Tag::WalletRemainingSignatures)?,
            signed_hashes: tlv.optional(Tag::WalletSignedHashes)?,
        })
    }
}
