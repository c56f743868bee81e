use bytes::Bytes;
use tapcard_apdu_core::{CommandApdu, Instruction, ResponseApdu, Tag};

use super::{
    CardCommand, EXTRA_DATA_CHUNK_LEN, Sealed, WriteIssuerDataResponse, build, success_payload,
};
use crate::{environment::CardEnvironment, error::CommandError, types::CardId};

const MODE_READ: u8 = 1;
const MODE_INITIALIZE: u8 = 1;
const MODE_WRITE: u8 = 2;
const MODE_FINALIZE: u8 = 3;

/// READ_ISSUER_DATA in extra-data mode: one chunk at `offset`
#[derive(Debug, Clone)]
pub struct ReadIssuerExtraDataCommand {
    card_id: CardId,
    offset: u16,
}

impl ReadIssuerExtraDataCommand {
    /// Read the chunk of `card_id` starting at `offset`
    pub const fn new(card_id: CardId, offset: u16) -> Self {
        Self { card_id, offset }
    }

    /// Offset of the requested chunk
    pub const fn offset(&self) -> u16 {
        self.offset
    }
}

/// One chunk of issuer extra data
///
/// The first chunk carries the total `size`; the last one carries the
/// finalizing `signature` and the `counter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerExtraDataChunk {
    /// Card that answered
    pub card_id: CardId,
    /// Total size, sent with the first chunk
    pub size: Option<u16>,
    /// Chunk bytes
    pub data: Bytes,
    /// Finalizing signature, sent with the last chunk
    pub signature: Option<Bytes>,
    /// Replay counter, sent with the last chunk
    pub counter: Option<u32>,
}

impl Sealed for ReadIssuerExtraDataCommand {}

impl CardCommand for ReadIssuerExtraDataCommand {
    type Response = IssuerExtraDataChunk;

    fn name(&self) -> &'static str {
        "read_issuer_extra_data"
    }

    fn instruction(&self) -> Instruction {
        Instruction::ReadIssuerData
    }

    fn serialize(&self, environment: &CardEnvironment) -> Result<CommandApdu, CommandError> {
        let builder = environment
            .tlv_builder()
            .append(Tag::Pin, environment.pin1().as_bytes())
            .append(Tag::CardId, &self.card_id)
            .append(Tag::Mode, MODE_READ)
            .append(Tag::Offset, self.offset);
        build(self.instruction(), builder)
    }

    fn deserialize(
        &self,
        _environment: &CardEnvironment,
        response: ResponseApdu,
    ) -> Result<Self::Response, CommandError> {
        let tlv = success_payload(&response)?;
        Ok(IssuerExtraDataChunk {
            card_id: tlv.value(Tag::CardId)?,
            size: tlv.optional(Tag::Size)?,
            data: tlv.optional(Tag::IssuerData)?.unwrap_or_default(),
            signature: tlv.optional(Tag::IssuerDataSignature)?,
            counter: tlv.optional(Tag::IssuerDataCounter)?,
        })
    }
}

/// One step of the three-phase extra data write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraDataWriteStep {
    /// Announce the total size, signed over `card_id || counter? || size`
    Initialize {
        size: u16,
        starting_signature: Bytes,
        counter: Option<u32>,
    },
    /// Store `chunk` at `offset`
    Write { offset: u16, chunk: Bytes },
    /// Commit, signed over `card_id || data || counter?`
    Finalize { finalizing_signature: Bytes },
}

/// WRITE_ISSUER_DATA in extra-data mode
#[derive(Debug, Clone)]
pub struct WriteIssuerExtraDataCommand {
    card_id: CardId,
    step: ExtraDataWriteStep,
}

impl WriteIssuerExtraDataCommand {
    /// Validate and build one step
    pub fn new(card_id: CardId, step: ExtraDataWriteStep) -> Result<Self, CommandError> {
        match &step {
            ExtraDataWriteStep::Initialize {
                starting_signature, ..
            } if starting_signature.is_empty() => {
                return Err(CommandError::InvalidParameters(
                    "starting signature is empty".into(),
                ));
            }
            ExtraDataWriteStep::Write { chunk, .. }
                if chunk.is_empty() || chunk.len() > EXTRA_DATA_CHUNK_LEN =>
            {
                return Err(CommandError::InvalidParameters(format!(
                    "chunk of {} bytes, expected 1..={EXTRA_DATA_CHUNK_LEN}",
                    chunk.len()
                )));
            }
            ExtraDataWriteStep::Finalize {
                finalizing_signature,
            } if finalizing_signature.is_empty() => {
                return Err(CommandError::InvalidParameters(
                    "finalizing signature is empty".into(),
                ));
            }
            _ => {}
        }
        Ok(Self { card_id, step })
    }

    /// Step this exchange performs
    pub const fn step(&self) -> &ExtraDataWriteStep {
        &self.step
    }
}

impl Sealed for WriteIssuerExtraDataCommand {}

impl CardCommand for WriteIssuerExtraDataCommand {
    type Response = WriteIssuerDataResponse;

    fn name(&self) -> &'static str {
        match self.step {
            ExtraDataWriteStep::Initialize { .. } => "write_issuer_extra_data/initialize",
            ExtraDataWriteStep::Write { .. } => "write_issuer_extra_data/write",
            ExtraDataWriteStep::Finalize { .. } => "write_issuer_extra_data/finalize",
        }
    }

    fn instruction(&self) -> Instruction {
        Instruction::WriteIssuerData
    }

    fn serialize(&self, environment: &CardEnvironment) -> Result<CommandApdu, CommandError> {
        let builder = environment
            .tlv_builder()
            .append(Tag::Pin, environment.pin1().as_bytes())
            .append(Tag::CardId, &self.card_id);
        let builder = match &self.step {
            ExtraDataWriteStep::Initialize {
                size,
                starting_signature,
                counter,
            } => builder
                .append(Tag::Mode, MODE_INITIALIZE)
                .append(Tag::Size, *size)
                .append(Tag::IssuerDataSignature, starting_signature)
                .append_optional(Tag::IssuerDataCounter, *counter),
            ExtraDataWriteStep::Write { offset, chunk } => builder
                .append(Tag::Mode, MODE_WRITE)
                .append(Tag::IssuerData, chunk)
                .append(Tag::Offset, *offset),
            ExtraDataWriteStep::Finalize {
                finalizing_signature,
            } => builder
                .append(Tag::Mode, MODE_FINALIZE)
                .append(Tag::IssuerDataSignature, finalizing_signature),
        };
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

#[cfg(test)]
mod tests {
    use tapcard_apdu_core::TlvBuilder;

    use super::*;
    use crate::commands::tests::{card_id, tags};

    #[test]
    fn test_read_serialize() {
        let apdu = ReadIssuerExtraDataCommand::new(card_id(), 1024)
            .serialize(&CardEnvironment::new())
            .unwrap();
        let tlv = apdu.tlv().unwrap();
        assert_eq!(apdu.instruction(), Instruction::ReadIssuerData);
        assert_eq!(
            tags(tlv.records()),
            vec![Tag::Pin, Tag::CardId, Tag::Mode, Tag::Offset]
        );
        assert_eq!(tlv.value::<u8>(Tag::Mode).unwrap(), 1);
        assert_eq!(tlv.value::<u16>(Tag::Offset).unwrap(), 1024);
    }

    #[test]
    fn test_first_and_last_chunk() {
        let command = ReadIssuerExtraDataCommand::new(card_id(), 0);
        let first = TlvBuilder::new()
            .append(Tag::CardId, &card_id())
            .append(Tag::Size, 700u16)
            .append(Tag::IssuerData, vec![0x11u8; 512])
            .serialize()
            .unwrap();
        let chunk = command
            .deserialize(&CardEnvironment::new(), ResponseApdu::success(first))
            .unwrap();
        assert_eq!(chunk.size, Some(700));
        assert_eq!(chunk.data.len(), 512);
        assert!(chunk.signature.is_none());

        let last = TlvBuilder::new()
            .append(Tag::CardId, &card_id())
            .append(Tag::IssuerData, vec![0x22u8; 188])
            .append(Tag::IssuerDataSignature, vec![0x33u8; 64])
            .append(Tag::IssuerDataCounter, 5u32)
            .serialize()
            .unwrap();
        let chunk = command
            .deserialize(&CardEnvironment::new(), ResponseApdu::success(last))
            .unwrap();
        assert_eq!(chunk.size, None);
        assert_eq!(chunk.counter, Some(5));
        assert_eq!(chunk.signature.map(|s| s.len()), Some(64));
    }

    #[test]
    fn test_write_steps() {
        let init = WriteIssuerExtraDataCommand::new(
            card_id(),
            ExtraDataWriteStep::Initialize {
                size: 1200,
                starting_signature: Bytes::from_static(&[1; 64]),
                counter: Some(3),
            },
        )
        .unwrap();
        assert_eq!(init.name(), "write_issuer_extra_data/initialize");
        let tlv = init.serialize(&CardEnvironment::new()).unwrap().tlv().unwrap();
        assert_eq!(
            tags(tlv.records()),
            vec![
                Tag::Pin,
                Tag::CardId,
                Tag::Mode,
                Tag::Size,
                Tag::IssuerDataSignature,
                Tag::IssuerDataCounter
            ]
        );
        assert_eq!(tlv.value::<u16>(Tag::Size).unwrap(), 1200);

        let write = WriteIssuerExtraDataCommand::new(
            card_id(),
            ExtraDataWriteStep::Write {
                offset: 512,
                chunk: Bytes::from(vec![0u8; 512]),
            },
        )
        .unwrap();
        let tlv = write.serialize(&CardEnvironment::new()).unwrap().tlv().unwrap();
        assert_eq!(tlv.value::<u8>(Tag::Mode).unwrap(), 2);
        assert_eq!(tlv.value::<u16>(Tag::Offset).unwrap(), 512);

        let finalize = WriteIssuerExtraDataCommand::new(
            card_id(),
            ExtraDataWriteStep::Finalize {
                finalizing_signature: Bytes::from_static(&[2; 64]),
            },
        )
        .unwrap();
        assert_eq!(finalize.name(), "write_issuer_extra_data/finalize");
        let tlv = finalize
            .serialize(&CardEnvironment::new())
            .unwrap()
            .tlv()
            .unwrap();
        assert_eq!(tlv.value::<u8>(Tag::Mode).unwrap(), 3);
    }

    #[test]
    fn test_write_validation() {
        let oversized = ExtraDataWriteStep::Write {
            offset: 0,
            chunk: Bytes::from(vec![0u8; EXTRA_DATA_CHUNK_LEN + 1]),
        };
        assert!(WriteIssuerExtraDataCommand::new(card_id(), oversized).is_err());

        let unsigned = ExtraDataWriteStep::Finalize {
            finalizing_signature: Bytes::new(),
        };
        assert!(WriteIssuerExtraDataCommand::new(card_id(), unsigned).is_err());
    }
}
