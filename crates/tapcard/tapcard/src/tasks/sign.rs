use async_trait::async_trait;
use bytes::Bytes;
use tapcard_apdu_core::CardTransport;
use tracing::debug;

use super::{Sealed, Task, require_status};
use crate::{
    commands::{CardCommand, SignCommand, SignResponse, validate_hashes},
    error::{CommandError, TaskError},
    session::CardSession,
    types::CardStatus,
};

/// Sign up to ten hashes with the wallet key
#[derive(Debug, Clone)]
pub struct SignTask {
    hashes: Vec<Bytes>,
}

impl SignTask {
    /// Validate the hashes up front so a bad batch never reaches the card
    pub fn new(hashes: Vec<Bytes>) -> Result<Self, CommandError> {
        validate_hashes(&hashes)?;
        Ok(Self { hashes })
    }
}

impl Sealed for SignTask {}

#[async_trait]
impl Task for SignTask {
    type Output = SignResponse;

    fn name(&self) -> &'static str {
        "sign"
    }

    async fn run<T: CardTransport + 'static>(
        self,
        session: &mut CardSession<T>,
    ) -> Result<SignResponse, TaskError> {
        let card = session.require_card()?;
        let command = SignCommand::new(card.card_id.clone(), self.hashes)
            .map_err(|e| TaskError::command("sign", e))?;
        require_status(&card, command.name(), CardStatus::Loaded)?;

        let response = session.send(&command).await?;
        debug!(
            signatures = response.signatures.len(),
            remaining = response.remaining_signatures,
            "Hashes signed"
        );
        session.update_card(|card| {
            card.wallet_remaining_signatures = Some(response.remaining_signatures);
            if let Some(signed) = response.signed_hashes {
                card.wallet_signed_hashes = Some(signed);
            }
        });
        Ok(response)
    }
}
