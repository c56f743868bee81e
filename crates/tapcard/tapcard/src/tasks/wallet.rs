use async_trait::async_trait;
use tapcard_apdu_core::CardTransport;
use tracing::info;

use super::{
    CheckWalletPolicy, Sealed, Task, WalletVerification, require_status, scan::verify_wallet,
};
use crate::{
    commands::{
        CardCommand, CreateWalletCommand, CreateWalletResponse, PurgeWalletCommand,
        PurgeWalletResponse,
    },
    error::{CommandError, TaskError},
    session::CardSession,
    types::{CardStatus, Setting},
};

/// Create the wallet key, then prove the card holds it
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateWalletTask {
    policy: CheckWalletPolicy,
}

impl CreateWalletTask {
    /// Create the wallet, then check it under `policy`
    pub const fn new(policy: CheckWalletPolicy) -> Self {
        Self { policy }
    }
}

impl Sealed for CreateWalletTask {}

#[async_trait]
impl Task for CreateWalletTask {
    type Output = (CreateWalletResponse, WalletVerification);

    fn name(&self) -> &'static str {
        "create_wallet"
    }

    async fn run<T: CardTransport + 'static>(
        self,
        session: &mut CardSession<T>,
    ) -> Result<Self::Output, TaskError> {
        let card = session.require_card()?;
        let command = CreateWalletCommand::new(card.card_id.clone());
        require_status(&card, command.name(), CardStatus::Empty)?;

        let response = session.send(&command).await?;
        info!(card_id = %response.card_id, "Wallet created");
        session.update_card(|card| {
            card.status = response.status;
            card.wallet_public_key = Some(response.wallet_public_key.clone());
        });

        let card = session.require_card()?;
        let verification = verify_wallet(session, &card, self.policy).await?;
        Ok((response, verification))
    }
}

/// Destroy the wallet key
#[derive(Debug, Clone, Copy, Default)]
pub struct PurgeWalletTask;

impl Sealed for PurgeWalletTask {}

#[async_trait]
impl Task for PurgeWalletTask {
    type Output = PurgeWalletResponse;

    fn name(&self) -> &'static str {
        "purge_wallet"
    }

    async fn run<T: CardTransport + 'static>(
        self,
        session: &mut CardSession<T>,
    ) -> Result<PurgeWalletResponse, TaskError> {
        let card = session.require_card()?;
        let command = PurgeWalletCommand::new(card.card_id.clone());
        require_status(&card, command.name(), CardStatus::Loaded)?;
        if card.settings_mask.contains(Setting::ProhibitPurgeWallet) {
            return Err(TaskError::command(
                command.name(),
                CommandError::InvalidState {
                    command: command.name(),
                    reason: "card prohibits purging the wallet".into(),
                },
            ));
        }

        let response = session.send(&command).await?;
        info!(card_id = %response.card_id, status = %response.status, "Wallet purged");
        session.update_card(|card| {
            card.status = response.status;
            card.wallet_public_key = None;
        });
        Ok(response)
    }
}
