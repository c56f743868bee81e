use tapcard_apdu_core::{CommandApdu, Instruction, ResponseApdu, Tag};

use super::{CardCommand, Sealed, build, success_payload};
use crate::{
    environment::CardEnvironment,
    error::CommandError,
    types::{CardId, CardStatus},
};

/// PURGE_WALLET: destroy the wallet key
#[derive(Debug, Clone)]
pub struct PurgeWalletCommand {
    card_id: CardId,
}

impl PurgeWalletCommand {
    /// Purge the wallet of `card_id`
    pub const fn new(card_id: CardId) -> Self {
        Self { card_id }
    }
}

/// Result of PURGE_WALLET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeWalletResponse {
    /// Card that answered
    pub card_id: CardId,
    /// `Empty` on reusable cards, `Purged` otherwise
    pub status: CardStatus,
}

impl Sealed for PurgeWalletCommand {}

impl CardCommand for PurgeWalletCommand {
    type Response = PurgeWalletResponse;

    fn name(&self) -> &'static str {
        "purge_wallet"
    }

    fn instruction(&self) -> Instruction {
        Instruction::PurgeWallet
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
        Ok(PurgeWalletResponse {
            card_id: tlv.value(Tag::CardId)?,
            status: tlv.value(Tag::Status)?,
        })
    }
}
