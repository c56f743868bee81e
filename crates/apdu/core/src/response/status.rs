//! Status word definitions for card responses

use std::fmt;

use tracing::Level;

/// How the session layer should treat a status word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// Command completed
    Success,
    /// Card is enforcing a security delay; poll again
    NeedsSecurityDelay,
    /// Card refuses plaintext for this command
    NeedsEncryption,
    /// Parameters rejected, usually a wrong PIN
    WrongPin,
    /// Command not allowed in the current card state
    InvalidState,
    /// Instruction unknown to this firmware
    UnsupportedInstruction,
    /// Card reported an internal processing error
    CardBusy,
    /// Anything else
    Other,
}

/// Status Word (SW1-SW2) from a card response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte (SW1)
    pub sw1: u8,
    /// Second status byte (SW2)
    pub sw2: u8,
}

impl StatusWord {
    /// Create a new status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Create from a u16 value (SW1 | SW2)
    pub const fn from_u16(status: u16) -> Self {
        Self {
            sw1: (status >> 8) as u8,
            sw2: status as u8,
        }
    }

    /// Convert to a u16 value (SW1 | SW2)
    pub const fn to_u16(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Classify this status word
    pub const fn kind(&self) -> StatusKind {
        match self.to_u16() {
            0x9000..=0x9007 => StatusKind::Success,
            0x9789 => StatusKind::NeedsSecurityDelay,
            0x6982 => StatusKind::NeedsEncryption,
            0x6A86 => StatusKind::WrongPin,
            0x6985 => StatusKind::InvalidState,
            0x6D00 => StatusKind::UnsupportedInstruction,
            0x6286 => StatusKind::CardBusy,
            _ => StatusKind::Other,
        }
    }

    /// Check if this status word indicates success
    ///
    /// `90 01` through `90 07` report a completed command that also changed
    /// a PIN and count as success.
    pub const fn is_success(&self) -> bool {
        matches!(self.kind(), StatusKind::Success)
    }

    /// Check if the card asks the host to wait out a security delay (97 89)
    pub const fn is_security_delay(&self) -> bool {
        matches!(self.kind(), StatusKind::NeedsSecurityDelay)
    }

    /// Get the appropriate tracing level for this status word
    pub const fn tracing_level(&self) -> Level {
        match self.kind() {
            StatusKind::Success => Level::DEBUG,
            StatusKind::NeedsSecurityDelay | StatusKind::NeedsEncryption => Level::INFO,
            _ => Level::WARN,
        }
    }

    /// Get a description of this status word
    pub const fn description(&self) -> &'static str {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "Process completed",
            (0x90, 0x01..=0x07) => "Process completed, PIN changed",
            (0x97, 0x89) => "Need pause",
            (0x69, 0x82) => "Need encryption",
            (0x6A, 0x86) => "Invalid parameters",
            (0x69, 0x85) => "Invalid state",
            (0x6D, 0x00) => "Instruction not supported",
            (0x62, 0x86) => "Error processing command",
            (0x6A, 0x82) => "File not found",
            (0x6A, 0x88) => "Wallet not found",
            _ => "Unknown status word",
        }
    }
}

impl From<u16> for StatusWord {
    fn from(status: u16) -> Self {
        Self::from_u16(status)
    }
}

impl From<StatusWord> for u16 {
    fn from(status: StatusWord) -> Self {
        status.to_u16()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}{:02X} ({})",
            self.sw1,
            self.sw2,
            self.description()
        )
    }
}

/// Status words used by the card firmware
pub mod common {
    use super::StatusWord;

    /// Process completed
    pub const SW_PROCESS_COMPLETED: StatusWord = StatusWord::new(0x90, 0x00);
    /// Need pause, security delay in progress
    pub const SW_NEED_PAUSE: StatusWord = StatusWord::new(0x97, 0x89);
    /// Payload must be encrypted
    pub const SW_NEED_ENCRYPTION: StatusWord = StatusWord::new(0x69, 0x82);
    /// Invalid parameters, including a wrong PIN
    pub const SW_INVALID_PARAMS: StatusWord = StatusWord::new(0x6A, 0x86);
    /// Command not allowed in the current state
    pub const SW_INVALID_STATE: StatusWord = StatusWord::new(0x69, 0x85);
    /// Instruction not supported
    pub const SW_INS_NOT_SUPPORTED: StatusWord = StatusWord::new(0x6D, 0x00);
    /// Error processing command
    pub const SW_ERROR_PROCESSING_COMMAND: StatusWord = StatusWord::new(0x62, 0x86);
    /// File not found
    pub const SW_FILE_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x82);
    /// Wallet not found
    pub const SW_WALLET_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x88);
}
