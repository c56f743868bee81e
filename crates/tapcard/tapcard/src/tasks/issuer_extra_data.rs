use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tapcard_apdu_core::{CardTransport, Tag};
use tracing::{debug, warn};

use super::{Sealed, Task, issuer_data::check_replay_counter};
use crate::{
    commands::{
        CardCommand, EXTRA_DATA_CHUNK_LEN, ExtraDataWriteStep, ReadIssuerExtraDataCommand,
        WriteIssuerDataResponse, WriteIssuerExtraDataCommand,
    },
    crypto::{self, issuer_data_message, issuer_extra_data_start_message},
    error::{CommandError, TaskError, VerificationError},
    session::CardSession,
    types::{CardId, EllipticCurve, Setting},
};

const READ_STEP: &str = "read_issuer_extra_data";
const WRITE_STEP: &str = "write_issuer_extra_data";

/// Issuer extra data reassembled from its chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerExtraData {
    /// Card that answered
    pub card_id: CardId,
    /// Verified extra data
    pub data: Bytes,
    /// Finalizing issuer signature
    pub signature: Bytes,
    /// Replay counter, when the card keeps one
    pub counter: Option<u32>,
}

impl IssuerExtraData {
    /// Verify the finalizing signature over `card_id || data || counter?`
    pub fn verify(&self, issuer_public_key: &[u8]) -> bool {
        let message = issuer_data_message(self.card_id.as_bytes(), &self.data, self.counter);
        crypto::verify(
            EllipticCurve::Secp256k1,
            issuer_public_key,
            &message,
            &self.signature,
        )
    }
}

/// Read the issuer extra data chunk by chunk
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadIssuerExtraDataTask;

impl Sealed for ReadIssuerExtraDataTask {}

#[async_trait]
impl Task for ReadIssuerExtraDataTask {
    type Output = IssuerExtraData;

    fn name(&self) -> &'static str {
        READ_STEP
    }

    async fn run<T: CardTransport + 'static>(
        self,
        session: &mut CardSession<T>,
    ) -> Result<IssuerExtraData, TaskError> {
        let card = session.require_card()?;
        let mut data = BytesMut::new();
        let mut size: Option<u16> = None;

        let (signature, counter) = loop {
            let offset = u16::try_from(data.len()).map_err(|_| {
                TaskError::command(
                    READ_STEP,
                    CommandError::TypeMismatch {
                        tag: Tag::IssuerData,
                        expected: "extra data within u16 offsets",
                        length: data.len(),
                    },
                )
            })?;
            let command = ReadIssuerExtraDataCommand::new(card.card_id.clone(), offset);
            let chunk = session.send(&command).await?;
            if size.is_none() {
                size = chunk.size;
            }
            data.extend_from_slice(&chunk.data);
            debug!(offset, received = data.len(), total = ?size, "Extra data chunk read");

            if let Some(signature) = chunk.signature {
                break (signature, chunk.counter);
            }
            let complete = size.is_some_and(|size| data.len() >= usize::from(size));
            if chunk.data.is_empty() || complete {
                return Err(TaskError::command(
                    READ_STEP,
                    CommandError::MissingTag(Tag::IssuerDataSignature),
                ));
            }
        };

        if let Some(size) = size {
            if data.len() != usize::from(size) {
                return Err(TaskError::command(
                    READ_STEP,
                    CommandError::TypeMismatch {
                        tag: Tag::IssuerData,
                        expected: "the announced extra data size",
                        length: data.len(),
                    },
                ));
            }
        }

        let extra = IssuerExtraData {
            card_id: card.card_id.clone(),
            data: data.freeze(),
            signature,
            counter,
        };
        match &card.issuer_data_public_key {
            Some(key) if !extra.verify(key) => {
                return Err(TaskError::verification(
                    READ_STEP,
                    VerificationError::SignatureInvalid("issuer extra data"),
                ));
            }
            Some(_) => debug!(len = extra.data.len(), "Issuer extra data verified"),
            None => warn!("Card reports no issuer data key, returning unverified extra data"),
        }
        Ok(extra)
    }
}

/// Write issuer extra data: initialize, 512-byte chunks, finalize
#[derive(Debug, Clone)]
pub struct WriteIssuerExtraDataTask {
    data: Bytes,
    starting_signature: Bytes,
    finalizing_signature: Bytes,
    counter: Option<u32>,
}

impl WriteIssuerExtraDataTask {
    /// Write `data` with its starting and finalizing issuer signatures
    pub const fn new(
        data: Bytes,
        starting_signature: Bytes,
        finalizing_signature: Bytes,
        counter: Option<u32>,
    ) -> Self {
        Self {
            data,
            starting_signature,
            finalizing_signature,
            counter,
        }
    }
}

impl Sealed for WriteIssuerExtraDataTask {}

#[async_trait]
impl Task for WriteIssuerExtraDataTask {
    type Output = WriteIssuerDataResponse;

    fn name(&self) -> &'static str {
        WRITE_STEP
    }

    async fn run<T: CardTransport + 'static>(
        self,
        session: &mut CardSession<T>,
    ) -> Result<WriteIssuerDataResponse, TaskError> {
        let card = session.require_card()?;
        let card_id = card.card_id.clone();
        let size = u16::try_from(self.data.len()).map_err(|_| {
            TaskError::command(
                WRITE_STEP,
                CommandError::InvalidParameters(format!(
                    "{} bytes of extra data exceed the card limit",
                    self.data.len()
                )),
            )
        })?;

        if self.counter.is_none()
            && card
                .settings_mask
                .contains(Setting::RestrictOverwriteIssuerExtraData)
        {
            return Err(TaskError::command(
                WRITE_STEP,
                CommandError::InvalidState {
                    command: WRITE_STEP,
                    reason: "card restricts overwriting extra data, a counter is required".into(),
                },
            ));
        }
        check_replay_counter(&card, WRITE_STEP, self.counter)?;

        if let Some(key) = &card.issuer_data_public_key {
            let starting = issuer_extra_data_start_message(card_id.as_bytes(), self.counter, size);
            if !crypto::verify(
                EllipticCurve::Secp256k1,
                key,
                &starting,
                &self.starting_signature,
            ) {
                return Err(TaskError::verification(
                    WRITE_STEP,
                    VerificationError::SignatureInvalid("starting"),
                ));
            }
            let finalizing = issuer_data_message(card_id.as_bytes(), &self.data, self.counter);
            if !crypto::verify(
                EllipticCurve::Secp256k1,
                key,
                &finalizing,
                &self.finalizing_signature,
            ) {
                return Err(TaskError::verification(
                    WRITE_STEP,
                    VerificationError::SignatureInvalid("finalizing"),
                ));
            }
        }

        let mut steps = vec![ExtraDataWriteStep::Initialize {
            size,
            starting_signature: self.starting_signature,
            counter: self.counter,
        }];
        steps.extend(
            (0..self.data.len())
                .step_by(EXTRA_DATA_CHUNK_LEN)
                .map(|start| ExtraDataWriteStep::Write {
                    // Bounded by `size`
                    offset: start as u16,
                    chunk: self
                        .data
                        .slice(start..(start + EXTRA_DATA_CHUNK_LEN).min(self.data.len())),
                }),
        );
        steps.push(ExtraDataWriteStep::Finalize {
            finalizing_signature: self.finalizing_signature,
        });

        let mut response = None;
        for step in steps {
            let command = WriteIssuerExtraDataCommand::new(card_id.clone(), step)
                .map_err(|e| TaskError::command(WRITE_STEP, e))?;
            debug!(step = command.name(), "Writing extra data");
            response = Some(session.send(&command).await?);
        }
        response.ok_or_else(|| {
            TaskError::command(
                WRITE_STEP,
                CommandError::InvalidParameters("no write steps".into()),
            )
        })
    }
}
