use derive_more::Display;

/// Lifecycle of a card session
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No link open
    #[default]
    Idle,
    /// Opening the link
    Connecting,
    /// Link open, no frame in flight
    Connected,
    /// A frame is in flight
    Exchanging,
    /// Closing the link
    Disconnecting,
    /// Ended by an error or cancellation
    Aborted,
}

impl SessionState {
    /// Whether the link is open
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connected | Self::Exchanging)
    }
}
