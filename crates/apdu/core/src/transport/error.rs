//! Error types for transports

/// Transport-related errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Could not establish the link
    #[error("failed to connect: {0}")]
    Connection(String),

    /// Frame could not be delivered or read back
    #[error("transmission failed: {0}")]
    Transmission(String),

    /// No answer within the exchange deadline
    #[error("timed out waiting for the card")]
    Timeout,

    /// Card left the field
    #[error("card was removed from the field")]
    TagLost,

    /// Operation attempted without a card in the field
    #[error("no card present")]
    NotPresent,

    /// Driver-specific error code
    #[error("driver error {0:#x}")]
    Driver(i64),
}

impl TransportError {
    /// Whether resending the same frame may succeed
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transmission(_))
    }
}
