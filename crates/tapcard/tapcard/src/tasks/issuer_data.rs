use async_trait::async_trait;
use bytes::Bytes;
use tapcard_apdu_core::CardTransport;
use tracing::{debug, warn};

use super::{Sealed, Task};
use crate::{
    commands::{
        CardCommand, ReadIssuerDataCommand, ReadIssuerDataResponse, WriteIssuerDataCommand,
        WriteIssuerDataResponse,
    },
    error::{CommandError, TaskError, VerificationError},
    session::CardSession,
    types::{Card, Setting},
};

/// Read the issuer data and verify it with the card's issuer key
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadIssuerDataTask;

impl Sealed for ReadIssuerDataTask {}

#[async_trait]
impl Task for ReadIssuerDataTask {
    type Output = ReadIssuerDataResponse;

    fn name(&self) -> &'static str {
        "read_issuer_data"
    }

    async fn run<T: CardTransport + 'static>(
        self,
        session: &mut CardSession<T>,
    ) -> Result<ReadIssuerDataResponse, TaskError> {
        let card = session.require_card()?;
        let command = ReadIssuerDataCommand::new(card.card_id.clone());
        let response = session.send(&command).await?;

        match &card.issuer_data_public_key {
            Some(key) if !response.verify(key) => {
                return Err(TaskError::verification(
                    command.name(),
                    VerificationError::SignatureInvalid("issuer data"),
                ));
            }
            Some(_) => debug!("Issuer data signature verified"),
            None => warn!("Card reports no issuer data key, returning unverified issuer data"),
        }
        Ok(response)
    }
}

/// Replace the issuer data after checking it locally
#[derive(Debug, Clone)]
pub struct WriteIssuerDataTask {
    data: Bytes,
    signature: Bytes,
    counter: Option<u32>,
}

impl WriteIssuerDataTask {
    /// Write `data`, signed by the issuer over the card id, data and counter
    pub const fn new(data: Bytes, signature: Bytes, counter: Option<u32>) -> Self {
        Self {
            data,
            signature,
            counter,
        }
    }
}

impl Sealed for WriteIssuerDataTask {}

#[async_trait]
impl Task for WriteIssuerDataTask {
    type Output = WriteIssuerDataResponse;

    fn name(&self) -> &'static str {
        "write_issuer_data"
    }

    async fn run<T: CardTransport + 'static>(
        self,
        session: &mut CardSession<T>,
    ) -> Result<WriteIssuerDataResponse, TaskError> {
        let card = session.require_card()?;
        let command = WriteIssuerDataCommand::new(
            card.card_id.clone(),
            self.data,
            self.signature,
            self.counter,
        )
        .map_err(|e| TaskError::command("write_issuer_data", e))?;

        check_replay_counter(&card, command.name(), command.issuer_data_counter())?;
        if let Some(key) = &card.issuer_data_public_key {
            if !command.verify(key) {
                return Err(TaskError::verification(
                    command.name(),
                    VerificationError::SignatureInvalid("issuer data"),
                ));
            }
        }

        session.send(&command).await
    }
}

/// Cards protecting issuer data against replay only accept counted writes
pub(crate) fn check_replay_counter(
    card: &Card,
    step: &'static str,
    counter: Option<u32>,
) -> Result<(), TaskError> {
    if counter.is_none() && card.settings_mask.contains(Setting::ProtectIssuerDataAgainstReplay) {
        return Err(TaskError::command(
            step,
            CommandError::InvalidState {
                command: step,
                reason: "card protects issuer data against replay, a counter is required".into(),
            },
        ));
    }
    Ok(())
}
