use tapcard_apdu_core::{
    FrameError, StatusKind, StatusWord, TransportError,
    tlv::{DecodeError, EncodeError, Tag, TlvError},
};

use crate::types::CardId;

/// Result type for tapcard operations
pub type Result<T> = std::result::Result<T, TaskError>;

/// Failure building a command or interpreting its response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// A required tag was absent
    #[error("response is missing tag {0}")]
    MissingTag(Tag),

    /// A tag was present but its value has the wrong shape
    #[error("{tag} cannot be read as {expected} ({length} bytes)")]
    TypeMismatch {
        /// Offending tag
        tag: Tag,
        /// Type the value was read as
        expected: &'static str,
        /// Length of the value
        length: usize,
    },

    /// The card answered with a non-success status
    #[error("card answered {0}")]
    UnexpectedStatus(StatusWord),

    /// Rejected before anything was sent
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The card is in the wrong state for the command
    #[error("{command} not allowed: {reason}")]
    InvalidState {
        /// Refused command
        command: &'static str,
        /// What is wrong with the card state
        reason: String,
    },

    /// Response payload is not valid TLV
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Command payload could not be encoded
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Payload encryption failed
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl CommandError {
    /// Status word carried by an `UnexpectedStatus`
    pub const fn status(&self) -> Option<StatusWord> {
        match self {
            Self::UnexpectedStatus(sw) => Some(*sw),
            _ => None,
        }
    }
}

impl From<TlvError> for CommandError {
    fn from(error: TlvError) -> Self {
        match error {
            TlvError::MissingTag(tag) => Self::MissingTag(tag),
            TlvError::TypeMismatch {
                tag,
                expected,
                length,
            } => Self::TypeMismatch {
                tag,
                expected,
                length,
            },
        }
    }
}

/// Link-level fault behind a `TransportFailure`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkFault {
    /// Reader-level failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Frame that failed its checks
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl LinkFault {
    /// Whether resending the same frame may succeed
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_transient(),
            Self::Frame(e) => e.is_transient(),
        }
    }
}

/// Failure of the session around the commands
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Another session holds the reader
    #[error("another session is active on this reader")]
    SessionBusy,

    /// The card kept asking for a pause past the configured ceiling
    #[error("security delay did not finish after {polls} polls")]
    SecurityDelayExpired {
        /// Pauses allowed before giving up
        polls: u32,
    },

    /// The link failed and resends did not help
    #[error("transport failure after {attempts} attempt(s): {source}")]
    TransportFailure {
        /// Tries made, resends included
        attempts: u32,
        /// Fault of the last try
        #[source]
        source: LinkFault,
    },

    /// The caller cancelled the session
    #[error("session cancelled")]
    Cancelled,

    /// The session cannot continue
    #[error("session aborted: {0}")]
    Aborted(&'static str),

    /// The card in the field is not the one asked for
    #[error("wrong card: expected {expected}, found {actual}")]
    WrongCard {
        /// Card the caller asked for
        expected: CardId,
        /// Card that answered
        actual: CardId,
    },
}

/// A signature did not verify
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// Names the signature that failed
    #[error("{0} signature is invalid")]
    SignatureInvalid(&'static str),
}

fn step_prefix(step: &Option<&'static str>) -> String {
    step.map(|step| format!("{step}: ")).unwrap_or_default()
}

impl From<SessionError> for TaskError {
    fn from(source: SessionError) -> Self {
        Self::Session { step: None, source }
    }
}

/// Terminal failure of a task
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// A command could not be built or its response not interpreted
    #[error("{step}: {source}")]
    Command {
        /// Failing command
        step: &'static str,
        #[source]
        source: CommandError,
    },

    /// The session failed, during the exchange of `step` when set
    #[error("{}{source}", step_prefix(.step))]
    Session {
        /// Command whose exchange failed
        step: Option<&'static str>,
        #[source]
        source: SessionError,
    },

    /// A signature returned by the card did not verify
    #[error("{step}: {source}")]
    Verification {
        /// Step that produced the signature
        step: &'static str,
        #[source]
        source: VerificationError,
    },
}

impl TaskError {
    pub(crate) const fn command(step: &'static str, source: CommandError) -> Self {
        Self::Command { step, source }
    }

    pub(crate) const fn verification(step: &'static str, source: VerificationError) -> Self {
        Self::Verification { step, source }
    }

    /// Attribute an untagged session failure to the exchange of `step`
    pub(crate) fn at_step(self, step: &'static str) -> Self {
        match self {
            Self::Session { step: None, source } => Self::Session {
                step: Some(step),
                source,
            },
            other => other,
        }
    }

    /// Session failure behind this error, if any
    pub const fn session(&self) -> Option<&SessionError> {
        match self {
            Self::Session { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Name of the failing step
    ///
    /// Session failures outside any command exchange, such as a busy reader
    /// or a failed connect, carry no step.
    pub const fn step(&self) -> Option<&'static str> {
        match self {
            Self::Command { step, .. } | Self::Verification { step, .. } => Some(step),
            Self::Session { step, .. } => *step,
        }
    }

    /// Status word the card answered with, when that caused the failure
    pub const fn status(&self) -> Option<StatusWord> {
        match self {
            Self::Command { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Whether the firmware does not know the instruction
    pub fn is_unsupported_instruction(&self) -> bool {
        self.status()
            .is_some_and(|sw| sw.kind() == StatusKind::UnsupportedInstruction)
    }

    /// Whether trying again later may succeed
    ///
    /// Busy readers, link faults, expired delays, cancellations and a card
    /// reporting a processing error are retryable. Wrong PINs, invalid
    /// states, malformed responses and bad signatures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Session { source, .. } => matches!(
                source,
                SessionError::SessionBusy
                    | SessionError::SecurityDelayExpired { .. }
                    | SessionError::TransportFailure { .. }
                    | SessionError::Cancelled
            ),
            Self::Command { source, .. } => source
                .status()
                .is_some_and(|sw| sw.kind() == StatusKind::CardBusy),
            Self::Verification { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapcard_apdu_core::response::status::common::*;

    #[test]
    fn test_retry_classification() {
        assert!(TaskError::from(SessionError::SessionBusy).is_retryable());
        assert!(TaskError::from(SessionError::Cancelled).is_retryable());
        assert!(!TaskError::from(SessionError::Aborted("test")).is_retryable());
        assert!(
            TaskError::command("sign", CommandError::UnexpectedStatus(SW_ERROR_PROCESSING_COMMAND))
                .is_retryable()
        );
        assert!(
            !TaskError::command("sign", CommandError::UnexpectedStatus(SW_INVALID_PARAMS))
                .is_retryable()
        );
        assert!(
            !TaskError::verification("check_wallet", VerificationError::SignatureInvalid("wallet"))
                .is_retryable()
        );
    }

    #[test]
    fn test_step_and_display() {
        let err = TaskError::command("check_wallet", CommandError::MissingTag(Tag::Salt));
        assert_eq!(err.step(), Some("check_wallet"));
        assert_eq!(err.to_string(), "check_wallet: response is missing tag Salt(0x17)");

        let delay = TaskError::from(SessionError::SecurityDelayExpired { polls: 3 }).at_step("sign");
        assert_eq!(delay.step(), Some("sign"));
        assert_eq!(delay.to_string(), "sign: security delay did not finish after 3 polls");
        assert_eq!(
            delay.clone().at_step("read").step(),
            Some("sign"),
            "an attributed failure keeps its step"
        );
        assert!(delay.is_retryable());

        let busy = TaskError::from(SessionError::SessionBusy);
        assert_eq!(busy.step(), None);
        assert_eq!(busy.to_string(), "another session is active on this reader");
        assert_eq!(busy.session(), Some(&SessionError::SessionBusy));

        let unsupported =
            TaskError::command("check_wallet", CommandError::UnexpectedStatus(SW_INS_NOT_SUPPORTED));
        assert!(unsupported.is_unsupported_instruction());
    }
}
