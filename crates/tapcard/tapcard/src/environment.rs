//! Per-card session parameters and their persistence
//!
//! A [`CardEnvironment`] is loaded from an [`EnvironmentRepository`] when a
//! session starts, updated only by exchanges that negotiate new state, and
//! written back once when the session ends if something changed.

use std::{collections::HashMap, fmt};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tapcard_apdu_core::{EncryptionMode, SessionKeyBytes, Tag, TlvBuilder};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::types::CardId;

/// Factory PIN1
pub const DEFAULT_PIN1: &str = "000000";
/// Factory PIN2
pub const DEFAULT_PIN2: &str = "000";

/// Value of the `LegacyMode` tag
const LEGACY_MODE_VALUE: u8 = 4;

/// SHA-256 digest of a PIN, the form the card expects
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Pin([u8; 32]);

impl Pin {
    /// Hash a PIN code
    pub fn from_code(code: &str) -> Self {
        Self(Sha256::digest(code.as_bytes()).into())
    }

    /// Digest bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(<redacted>)")
    }
}

/// Negotiated AES-256 payload key
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey(SessionKeyBytes);

impl SessionKey {
    pub(crate) const fn new(bytes: SessionKeyBytes) -> Self {
        Self(bytes)
    }

    pub(crate) const fn as_bytes(&self) -> &SessionKeyBytes {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// Parameters of one card session
#[derive(Debug, Clone)]
pub struct CardEnvironment {
    card_id: Option<CardId>,
    pin1: Pin,
    pin2: Pin,
    encryption_mode: EncryptionMode,
    encryption_key: Option<SessionKey>,
    legacy_mode: bool,
}

impl Default for CardEnvironment {
    fn default() -> Self {
        Self {
            card_id: None,
            pin1: Pin::from_code(DEFAULT_PIN1),
            pin2: Pin::from_code(DEFAULT_PIN2),
            encryption_mode: EncryptionMode::None,
            encryption_key: None,
            legacy_mode: false,
        }
    }
}

impl CardEnvironment {
    /// Environment with factory PINs and no encryption
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the environment to a card
    pub fn with_card_id(mut self, card_id: CardId) -> Self {
        self.card_id = Some(card_id);
        self
    }

    /// Use other PINs
    pub fn with_pins(mut self, pin1: Pin, pin2: Pin) -> Self {
        self.pin1 = pin1;
        self.pin2 = pin2;
        self
    }

    /// Prefer an encryption mode; the key is negotiated in-session
    pub fn with_encryption_mode(mut self, mode: EncryptionMode) -> Self {
        self.encryption_mode = mode;
        self
    }

    /// Prepend the `LegacyMode` marker to every payload
    pub fn with_legacy_mode(mut self, legacy_mode: bool) -> Self {
        self.legacy_mode = legacy_mode;
        self
    }

    /// Card the environment is bound to, once known
    pub const fn card_id(&self) -> Option<&CardId> {
        self.card_id.as_ref()
    }

    /// Digest of the access code
    pub const fn pin1(&self) -> &Pin {
        &self.pin1
    }

    /// Digest of the passcode
    pub const fn pin2(&self) -> &Pin {
        &self.pin2
    }

    /// Encryption mode in use or preferred
    pub const fn encryption_mode(&self) -> EncryptionMode {
        self.encryption_mode
    }

    /// Key negotiated in this session
    pub const fn encryption_key(&self) -> Option<&SessionKey> {
        self.encryption_key.as_ref()
    }

    /// Whether payloads carry the legacy marker
    pub const fn legacy_mode(&self) -> bool {
        self.legacy_mode
    }

    /// Builder for command payloads, carrying the legacy marker when enabled
    pub fn tlv_builder(&self) -> TlvBuilder {
        let builder = TlvBuilder::new();
        if self.legacy_mode {
            builder.append(Tag::LegacyMode, LEGACY_MODE_VALUE)
        } else {
            builder
        }
    }

    /// Settings that survive the session
    pub const fn persisted(&self) -> PersistedSettings {
        PersistedSettings {
            encryption_mode: self.encryption_mode,
            legacy_mode: self.legacy_mode,
        }
    }

    pub(crate) fn set_card_id(&mut self, card_id: CardId) {
        self.card_id = Some(card_id);
    }

    pub(crate) fn set_session_key(&mut self, mode: EncryptionMode, key: SessionKey) {
        self.encryption_mode = mode;
        self.encryption_key = Some(key);
    }
}

/// Non-secret environment fields kept between sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistedSettings {
    /// Negotiated encryption mode
    pub encryption_mode: EncryptionMode,
    /// Whether payloads carry the legacy marker
    pub legacy_mode: bool,
}

/// Failure writing an environment back
#[derive(Debug, thiserror::Error)]
#[error("failed to save environment for card {card_id}: {reason}")]
pub struct RepositoryError {
    /// Card whose environment was not saved
    pub card_id: CardId,
    /// Storage failure
    pub reason: String,
}

/// Storage for per-card environments
pub trait EnvironmentRepository: Send + Sync + fmt::Debug {
    /// Environment for `card_id`, or the defaults when the card is unknown
    fn load(&self, card_id: Option<&CardId>) -> CardEnvironment;

    /// Persist the environment of `card_id`
    fn save(&self, card_id: &CardId, environment: &CardEnvironment)
    -> Result<(), RepositoryError>;
}

/// Process-local repository
///
/// Every loaded environment starts from the template (PINs), with the
/// persisted settings of the card applied on top.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    template: CardEnvironment,
    settings: Mutex<HashMap<CardId, PersistedSettings>>,
}

impl InMemoryRepository {
    /// Repository with factory defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `template` as the base for every card
    pub fn with_template(template: CardEnvironment) -> Self {
        Self {
            template,
            settings: Mutex::default(),
        }
    }

    /// Stored settings of a card
    pub fn settings(&self, card_id: &CardId) -> Option<PersistedSettings> {
        self.settings.lock().get(card_id).copied()
    }
}

impl EnvironmentRepository for InMemoryRepository {
    fn load(&self, card_id: Option<&CardId>) -> CardEnvironment {
        let mut environment = self.template.clone();
        environment.encryption_key = None;
        let Some(card_id) = card_id else {
            environment.card_id = None;
            return environment;
        };

        if let Some(settings) = self.settings(card_id) {
            environment = environment
                .with_encryption_mode(settings.encryption_mode)
                .with_legacy_mode(settings.legacy_mode);
        }
        environment.with_card_id(card_id.clone())
    }

    fn save(
        &self,
        card_id: &CardId,
        environment: &CardEnvironment,
    ) -> Result<(), RepositoryError> {
        self.settings
            .lock()
            .insert(card_id.clone(), environment.persisted());
        Ok(())
    }
}
