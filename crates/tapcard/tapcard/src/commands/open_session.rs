use bytes::Bytes;
use k256::PublicKey;
use tapcard_apdu_core::{CommandApdu, EncryptionMode, Instruction, ResponseApdu, Tag};

use super::{CardCommand, Sealed, build, success_payload};
use crate::{crypto::encode_public_key, environment::CardEnvironment, error::CommandError};

/// OPEN_SESSION: exchange ephemeral keys for strong encryption
///
/// Always sent in plaintext with the strong mode announced in P1.
#[derive(Debug, Clone)]
pub struct OpenSessionCommand {
    host_key: PublicKey,
}

impl OpenSessionCommand {
    /// Offer `host_key` for the exchange
    pub const fn new(host_key: PublicKey) -> Self {
        Self { host_key }
    }
}

/// Card half of the key exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSessionResponse {
    /// Ephemeral public key of the card
    pub card_key: PublicKey,
}

impl Sealed for OpenSessionCommand {}

impl CardCommand for OpenSessionCommand {
    type Response = OpenSessionResponse;

    fn name(&self) -> &'static str {
        "open_session"
    }

    fn instruction(&self) -> Instruction {
        Instruction::OpenSession
    }

    fn serialize(&self, environment: &CardEnvironment) -> Result<CommandApdu, CommandError> {
        let builder = environment
            .tlv_builder()
            .append(Tag::SessionKeyA, encode_public_key(&self.host_key));
        Ok(build(self.instruction(), builder)?.with_p1(EncryptionMode::Strong.code()))
    }

    fn deserialize(
        &self,
        _environment: &CardEnvironment,
        response: ResponseApdu,
    ) -> Result<Self::Response, CommandError> {
        let tlv = success_payload(&response)?;
        let encoded: Bytes = tlv.value(Tag::SessionKeyB)?;
        let card_key =
            PublicKey::from_sec1_bytes(&encoded).map_err(|_| CommandError::TypeMismatch {
                tag: Tag::SessionKeyB,
                expected: "secp256k1 public key",
                length: encoded.len(),
            })?;
        Ok(OpenSessionResponse { card_key })
    }
}
