use tapcard_apdu_core::{CommandApdu, Instruction, ResponseApdu, Tag};

use super::{CardCommand, Sealed, build, success_payload};
use crate::{environment::CardEnvironment, error::CommandError, types::Card};

/// READ: card identity, status, settings and wallet information
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadCommand;

impl Sealed for ReadCommand {}

impl CardCommand for ReadCommand {
    type Response = Card;

    fn name(&self) -> &'static str {
        "read"
    }

    fn instruction(&self) -> Instruction {
        Instruction::Read
    }

    fn serialize(&self, environment: &CardEnvironment) -> Result<CommandApdu, CommandError> {
        let builder = environment
            .tlv_builder()
            .append(Tag::Pin, environment.pin1().as_bytes());
        build(self.instruction(), builder)
    }

    fn deserialize(
        &self,
        _environment: &CardEnvironment,
        response: ResponseApdu,
    ) -> Result<Card, CommandError> {
        let tlv = success_payload(&response)?;
        Ok(Card::try_from(&tlv)?)
    }
}
