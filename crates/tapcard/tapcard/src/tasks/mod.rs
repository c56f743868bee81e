//! Tasks: one logical card operation each
//!
//! A task runs inside a started [`CardSession`], after the preflight Read,
//! and produces exactly one terminal result. Preconditions are checked
//! against the cached card before any frame is sent.

mod issuer_data;
mod issuer_extra_data;
mod scan;
mod sign;
mod wallet;

pub use issuer_data::{ReadIssuerDataTask, WriteIssuerDataTask};
pub use issuer_extra_data::{IssuerExtraData, ReadIssuerExtraDataTask, WriteIssuerExtraDataTask};
pub use scan::{CheckWalletPolicy, ScanOutcome, ScanTask, WalletVerification};
pub use sign::SignTask;
pub use wallet::{CreateWalletTask, PurgeWalletTask};

use async_trait::async_trait;
use tapcard_apdu_core::CardTransport;

use crate::{
    error::{CommandError, TaskError},
    session::CardSession,
    types::{Card, CardStatus},
};

mod private {
    /// Keeps task implementations inside this crate
    pub trait Sealed {}
}

pub(crate) use private::Sealed;

/// A logical card operation
#[async_trait]
pub trait Task: Sealed + Send {
    /// Terminal result
    type Output: Send;

    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Run against a started session
    async fn run<T: CardTransport + 'static>(
        self,
        session: &mut CardSession<T>,
    ) -> Result<Self::Output, TaskError>;
}

/// Reject `step` unless the card is in `expected`
pub(crate) fn require_status(
    card: &Card,
    step: &'static str,
    expected: CardStatus,
) -> Result<(), TaskError> {
    if card.status == expected {
        return Ok(());
    }
    Err(TaskError::command(
        step,
        CommandError::InvalidState {
            command: step,
            reason: format!("card is {}, expected {expected}", card.status),
        },
    ))
}
