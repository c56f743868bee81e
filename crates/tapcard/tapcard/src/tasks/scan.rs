use async_trait::async_trait;
use tapcard_apdu_core::{CardTransport, Tag};
use tracing::{debug, warn};

use super::{Sealed, Task};
use crate::{
    commands::{CardCommand, CheckWalletCommand},
    error::{CommandError, TaskError, VerificationError},
    session::CardSession,
    types::{Card, CardStatus},
};

const CHECK_WALLET_STEP: &str = "check_wallet";

/// How a CheckWallet the firmware does not know is treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CheckWalletPolicy {
    /// Unsupported instruction yields [`WalletVerification::Skipped`]
    #[default]
    Tolerant,
    /// Every CheckWallet failure fails the task
    Strict,
}

/// Outcome of the wallet key check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletVerification {
    /// The card proved it holds the wallet key
    Verified,
    /// The firmware does not support CheckWallet
    Skipped,
    /// The card does not hold a wallet
    NotApplicable,
}

/// Result of a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Card as read
    pub card: Card,
    /// Wallet key check outcome
    pub wallet: WalletVerification,
}

/// Read the card and check its wallet key
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanTask {
    policy: CheckWalletPolicy,
}

impl ScanTask {
    /// Scan with the given CheckWallet policy
    pub const fn new(policy: CheckWalletPolicy) -> Self {
        Self { policy }
    }
}

impl Sealed for ScanTask {}

#[async_trait]
impl Task for ScanTask {
    type Output = ScanOutcome;

    fn name(&self) -> &'static str {
        "scan"
    }

    async fn run<T: CardTransport + 'static>(
        self,
        session: &mut CardSession<T>,
    ) -> Result<ScanOutcome, TaskError> {
        let card = session.require_card()?;
        let wallet = verify_wallet(session, &card, self.policy).await?;
        Ok(ScanOutcome { card, wallet })
    }
}

/// Challenge the card to prove it holds the wallet key of `card`
pub(crate) async fn verify_wallet<T: CardTransport + 'static>(
    session: &mut CardSession<T>,
    card: &Card,
    policy: CheckWalletPolicy,
) -> Result<WalletVerification, TaskError> {
    if card.status != CardStatus::Loaded {
        return Ok(WalletVerification::NotApplicable);
    }
    // A loaded wallet is only reported once CheckWallet has proven its key
    let missing = |tag: Tag| TaskError::command(CHECK_WALLET_STEP, CommandError::MissingTag(tag));
    let curve = card.curve.ok_or_else(|| missing(Tag::CurveId))?;
    let public_key = card
        .wallet_public_key
        .as_ref()
        .ok_or_else(|| missing(Tag::WalletPublicKey))?;

    let command = CheckWalletCommand::new(card.card_id.clone());
    let response = match session.send(&command).await {
        Ok(response) => response,
        Err(e) if e.is_unsupported_instruction() && policy == CheckWalletPolicy::Tolerant => {
            warn!("Firmware does not support CheckWallet, skipping wallet verification");
            return Ok(WalletVerification::Skipped);
        }
        Err(e) => return Err(e),
    };

    if !response.verify(curve, public_key) {
        return Err(TaskError::verification(
            command.name(),
            VerificationError::SignatureInvalid("wallet"),
        ));
    }
    debug!(%curve, "Wallet key verified");
    Ok(WalletVerification::Verified)
}
