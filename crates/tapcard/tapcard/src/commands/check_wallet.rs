use bytes::Bytes;
use tapcard_apdu_core::{CommandApdu, Instruction, ResponseApdu, Tag};

use super::{CardCommand, Sealed, build, success_payload};
use crate::{
    crypto::{self, generate_challenge},
    environment::CardEnvironment,
    error::CommandError,
    types::{CardId, EllipticCurve},
};

/// CHECK_WALLET: challenge the card to prove it holds the wallet key
#[derive(Debug, Clone)]
pub struct CheckWalletCommand {
    card_id: CardId,
    challenge: Bytes,
}

impl CheckWalletCommand {
    /// Command with a fresh random 16-byte challenge
    pub fn new(card_id: CardId) -> Self {
        Self {
            card_id,
            challenge: Bytes::copy_from_slice(&generate_challenge()),
        }
    }

    /// Command with a caller-chosen challenge
    pub fn with_challenge(
        card_id: CardId,
        challenge: impl Into<Bytes>,
    ) -> Result<Self, CommandError> {
        let challenge = challenge.into();
        if challenge.is_empty() {
            return Err(CommandError::InvalidParameters(
                "challenge must not be empty".into(),
            ));
        }
        Ok(Self { card_id, challenge })
    }

    /// Random challenge the card signs
    pub const fn challenge(&self) -> &Bytes {
        &self.challenge
    }
}

/// Result of CHECK_WALLET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckWalletResponse {
    /// Card that answered
    pub card_id: CardId,
    /// Challenge that was sent
    pub challenge: Bytes,
    /// Card-chosen salt
    pub salt: Bytes,
    /// Signature over `challenge ‖ salt`
    pub wallet_signature: Bytes,
}

impl CheckWalletResponse {
    /// Signed message: `challenge || salt`
    pub fn message(&self) -> Vec<u8> {
        [self.challenge.as_ref(), self.salt.as_ref()].concat()
    }

    /// Verify the signature with the wallet key
    pub fn verify(&self, curve: EllipticCurve, wallet_public_key: &[u8]) -> bool {
        crypto::verify(
            curve,
            wallet_public_key,
            &self.message(),
            &self.wallet_signature,
        )
    }
}

impl Sealed for CheckWalletCommand {}

impl CardCommand for CheckWalletCommand {
    type Response = CheckWalletResponse;

    fn name(&self) -> &'static str {
        "check_wallet"
    }

    fn instruction(&self) -> Instruction {
        Instruction::CheckWallet
    }

    fn serialize(&self, environment: &CardEnvironment) -> Result<CommandApdu, CommandError> {
        let builder = environment
            .tlv_builder()
            .append(Tag::Pin, environment.pin1().as_bytes())
            .append(Tag::CardId, &self.card_id)
            .append(Tag::Challenge, &self.challenge);
        build(self.instruction(), builder)
    }

    fn deserialize(
        &self,
        _environment: &CardEnvironment,
        response: ResponseApdu,
    ) -> Result<Self::Response, CommandError> {
        let tlv = success_payload(&response)?;
        Ok(CheckWalletResponse {
            card_id: tlv.value(Tag::CardId)?,
            challenge: self.challenge.clone(),
            salt: tlv.value(Tag::Salt)?,
            wallet_signature: tlv.value(Tag::WalletSignature)?,
        })
    }
}
