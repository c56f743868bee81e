//! Host-side engine for contactless wallet cards
//!
//! The crate is layered bottom-up:
//!
//! - [`commands`]: typed card commands over the TLV wire format
//! - [`session`]: one exclusive, cancellable session per reader with
//!   security-delay handling and payload encryption
//! - [`tasks`]: logical operations such as scanning or signing, each with
//!   one terminal result
//! - [`CardManager`]: the entry point tying a reader, an
//!   [`EnvironmentRepository`] and the tasks together
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

pub mod commands;
pub mod crypto;
pub mod environment;
mod error;
mod manager;
pub mod session;
pub mod tasks;
pub mod types;

#[cfg(test)]
mod testing;

pub use environment::{
    CardEnvironment, DEFAULT_PIN1, DEFAULT_PIN2, EnvironmentRepository, InMemoryRepository, Pin,
    PersistedSettings, RepositoryError,
};
pub use error::{CommandError, LinkFault, Result, SessionError, TaskError, VerificationError};
pub use manager::CardManager;
pub use session::{CancelToken, CardReader, CardSession, SessionConfig, SessionDelegate};
pub use tasks::{ScanOutcome, WalletVerification};
pub use types::{Card, CardId, CardStatus, EllipticCurve, Setting, SettingsMask};

/// Re-export of the wire layer
pub use tapcard_apdu_core as apdu;

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::commands::CardCommand;
    pub use crate::tasks::Task;
    pub use crate::{
        Card, CardEnvironment, CardId, CardManager, CardStatus, EnvironmentRepository,
        InMemoryRepository, Result, SessionConfig, SessionDelegate, TaskError,
    };
    pub use tapcard_apdu_core::{CardTransport, EncryptionMode};
}
