//! Session tuning

use std::time::Duration;

use tapcard_apdu_core::EncryptionMode;

/// Configuration options for a card session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for a single frame exchange
    pub exchange_timeout: Duration,

    /// Raw resends after a transient link fault
    pub max_transport_retries: u32,

    /// Security delay polls tolerated before giving up
    pub max_security_delay_polls: u32,

    /// Wait used when a `NeedPause` response carries no Pause tag
    pub default_security_delay: Duration,

    /// Mode to negotiate at session start, on top of the stored one
    pub preferred_encryption: EncryptionMode,

    /// Open an encrypted session when the card asks for one
    pub negotiate_encryption: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            exchange_timeout: Duration::from_secs(5),
            max_transport_retries: 3,
            max_security_delay_polls: 120,
            default_security_delay: Duration::from_secs(1),
            preferred_encryption: EncryptionMode::None,
            negotiate_encryption: true,
        }
    }
}

impl SessionConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-exchange timeout
    pub const fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    /// Set the number of resends after a transient fault
    pub const fn with_max_transport_retries(mut self, retries: u32) -> Self {
        self.max_transport_retries = retries;
        self
    }

    /// Set the security delay poll ceiling
    pub const fn with_max_security_delay_polls(mut self, polls: u32) -> Self {
        self.max_security_delay_polls = polls;
        self
    }

    /// Set the fallback security delay
    pub const fn with_default_security_delay(mut self, delay: Duration) -> Self {
        self.default_security_delay = delay;
        self
    }

    /// Set the encryption mode negotiated up front
    pub const fn with_preferred_encryption(mut self, mode: EncryptionMode) -> Self {
        self.preferred_encryption = mode;
        self
    }

    /// Set whether `NeedEncryption` triggers a key exchange
    pub const fn with_negotiate_encryption(mut self, negotiate: bool) -> Self {
        self.negotiate_encryption = negotiate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builders() {
        let config = SessionConfig::new();
        assert_eq!(config.exchange_timeout, Duration::from_secs(5));
        assert_eq!(config.max_transport_retries, 3);
        assert_eq!(config.max_security_delay_polls, 120);
        assert!(config.negotiate_encryption);

        let config = config
            .with_max_security_delay_polls(2)
            .with_preferred_encryption(EncryptionMode::Strong)
            .with_negotiate_encryption(false);
        assert_eq!(config.max_security_delay_polls, 2);
        assert_eq!(config.preferred_encryption, EncryptionMode::Strong);
        assert!(!config.negotiate_encryption);
    }
}
