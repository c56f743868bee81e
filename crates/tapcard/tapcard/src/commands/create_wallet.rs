use bytes::Bytes;
use tapcard_apdu_core::{CommandApdu, Instruction, ResponseApdu, Tag};

use super::{CardCommand, Sealed, build, success_payload};
use crate::{
    environment::CardEnvironment,
    error::CommandError,
    types::{CardId, CardStatus},
};

/// CREATE_WALLET: generate the wallet key on an empty card
#[derive(Debug, Clone)]
pub struct CreateWalletCommand {
    card_id: CardId,
}

impl CreateWalletCommand {
    /// Create the wallet of `card_id`
    pub const fn new(card_id: CardId) -> Self {
        Self { card_id }
    }
}

/// Result of CREATE_WALLET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateWalletResponse {
    /// Card that answered
    pub card_id: CardId,
    /// Status after creation
    pub status: CardStatus,
    /// Wallet public key
    pub wallet_public_key: Bytes,
}

impl Sealed for CreateWalletCommand {}

impl CardCommand for CreateWalletCommand {
    type Response = CreateWalletResponse;

    fn name(&self) -> &'static str {
        "create_wallet"
    }

    fn instruction(&self) -> Instruction {
        Instruction::CreateWallet
    }

    fn serialize(&self, environment: &CardEnvironment) -> Result<CommandApdu, CommandError> {
        let builder = environment
            .tlv_builder()
            .append(Tag::Pin, environment.pin1().as_bytes())
            .append(Tag::CardId, &self.card_id)
            .append(Tag::Pin2, environment.pin2().as_bytes());
        build(self.instruction(), builder)
    }

    fn deserialize(
        &self,
        _environment: &CardEnvironment,
        response: ResponseApdu,
    ) -> Result<Self::Response, CommandError> {
        let tlv = success_payload(&response)?;
        Ok(CreateWalletResponse {
            card_id: tlv.value(Tag::CardId)?,
            status: tlv.value(Tag::Status)?,
            wallet_public_key: tlv.value(Tag::WalletPublicKey)?,
        })
    }
}
