//! Card session
//!
//! A [`CardSession`] owns the reader for the duration of one task. It opens
//! the link, reads the card, and drives every command exchange: payload
//! encryption, per-exchange timeouts, resends after transient link faults,
//! the security delay loop and on-demand key negotiation. The link is closed
//! exactly once, by [`CardSession::finish`] or, failing that, on drop.

mod cancel;
mod config;
mod delegate;
mod reader;
mod state;

pub use cancel::CancelToken;
pub use config::SessionConfig;
pub use delegate::{SessionDelegate, SilentDelegate, TracingDelegate};
pub use reader::CardReader;
pub use state::SessionState;

use std::{sync::Arc, time::Duration};

use tapcard_apdu_core::{
    CardTransport, CommandApdu, EncryptionMode, Instruction, ResponseApdu, StatusKind, Tag,
    TransportError,
};
use tokio::{runtime::Handle, sync::OwnedMutexGuard};
use tracing::{Level, debug, info, instrument, warn};

use crate::{
    commands::{CardCommand, OpenSessionCommand, ReadCommand},
    crypto,
    environment::{CardEnvironment, PersistedSettings, SessionKey},
    error::{LinkFault, SessionError, TaskError},
    types::Card,
};

/// Duration of one unit of the Pause tag
const PAUSE_UNIT: Duration = Duration::from_millis(10);

/// One session with the card in the field
pub struct CardSession<T: CardTransport + 'static> {
    transport: Option<OwnedMutexGuard<T>>,
    environment: CardEnvironment,
    loaded: PersistedSettings,
    config: SessionConfig,
    delegate: Arc<dyn SessionDelegate>,
    cancel: CancelToken,
    state: SessionState,
    card: Option<Card>,
    link_open: bool,
}

impl<T: CardTransport + 'static> std::fmt::Debug for CardSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardSession")
            .field("state", &self.state)
            .field("card_id", &self.environment.card_id())
            .field("encryption", &self.environment.encryption_mode())
            .finish_non_exhaustive()
    }
}

impl<T: CardTransport + 'static> CardSession<T> {
    pub(crate) fn new(
        transport: OwnedMutexGuard<T>,
        environment: CardEnvironment,
        config: SessionConfig,
        delegate: Arc<dyn SessionDelegate>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            transport: Some(transport),
            loaded: environment.persisted(),
            environment,
            config,
            delegate,
            cancel,
            state: SessionState::Idle,
            card: None,
            link_open: false,
        }
    }

    /// Current lifecycle state
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Parameters the session runs with, including any negotiated key
    pub const fn environment(&self) -> &CardEnvironment {
        &self.environment
    }

    /// Timeouts and limits of this session
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Card as read by the preflight, updated by state-changing tasks
    pub const fn card(&self) -> Option<&Card> {
        self.card.as_ref()
    }

    pub(crate) fn require_card(&self) -> Result<Card, TaskError> {
        self.card
            .clone()
            .ok_or_else(|| SessionError::Aborted("card has not been read").into())
    }

    pub(crate) fn update_card(&mut self, update: impl FnOnce(&mut Card)) {
        if let Some(card) = self.card.as_mut() {
            update(card);
        }
    }

    /// Whether persisted settings differ from what was loaded
    pub fn environment_changed(&self) -> bool {
        self.environment.persisted() != self.loaded
    }

    /// Open the link, negotiate encryption when preferred, and read the card
    #[instrument(level = "debug", skip(self))]
    pub async fn start(&mut self) -> Result<&Card, TaskError> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Cancelled.into());
        }
        let Some(transport) = self.transport.as_deref_mut() else {
            return Err(SessionError::Aborted("reader released").into());
        };

        self.state = SessionState::Connecting;
        // Disconnect is owed from here on, even if connect fails
        self.link_open = true;
        if let Err(e) = transport.connect().await {
            warn!(error = %e, "Failed to connect to card");
            if e == TransportError::TagLost {
                self.delegate.on_tag_lost();
            }
            return Err(SessionError::TransportFailure {
                attempts: 1,
                source: LinkFault::Transport(e),
            }
            .into());
        }
        self.state = SessionState::Connected;
        debug!("Connected to card");

        let wants_encryption = self.environment.encryption_mode() != EncryptionMode::None
            || self.config.preferred_encryption != EncryptionMode::None;
        if wants_encryption && self.environment.encryption_key().is_none() {
            self.open_encrypted_session().await?;
        }

        let card = self.send(&ReadCommand).await?;
        match self.environment.card_id() {
            Some(expected) if *expected != card.card_id => {
                return Err(SessionError::WrongCard {
                    expected: expected.clone(),
                    actual: card.card_id,
                }
                .into());
            }
            Some(_) => {}
            None => self.environment.set_card_id(card.card_id.clone()),
        }
        debug!(card_id = %card.card_id, status = %card.status, "Card read");

        Ok(self.card.insert(card))
    }

    /// Exchange one command, handling security delays and encryption
    ///
    /// Session failures during the exchange are tagged with the command name.
    #[instrument(level = "debug", skip_all, fields(step = command.name()))]
    pub async fn send<C: CardCommand>(&mut self, command: &C) -> Result<C::Response, TaskError> {
        let step = command.name();
        self.drive(command).await.map_err(|e| e.at_step(step))
    }

    async fn drive<C: CardCommand>(&mut self, command: &C) -> Result<C::Response, TaskError> {
        let step = command.name();
        let mut polls = 0u32;
        let mut negotiated = false;

        loop {
            let apdu = command
                .serialize(&self.environment)
                .map_err(|e| TaskError::command(step, e))?;
            let response = self.exchange(step, &apdu).await?;

            match response.status().kind() {
                StatusKind::NeedsSecurityDelay => {
                    polls += 1;
                    if polls > self.config.max_security_delay_polls {
                        warn!(polls, "Security delay did not finish");
                        return Err(SessionError::SecurityDelayExpired {
                            polls: self.config.max_security_delay_polls,
                        }
                        .into());
                    }
                    let remaining = self.remaining_delay(&response);
                    self.delegate.on_security_delay(remaining);
                    wait(&self.cancel, remaining).await?;
                }
                StatusKind::NeedsEncryption
                    if !negotiated
                        && self.config.negotiate_encryption
                        && self.environment.encryption_key().is_none() =>
                {
                    debug!("Card requires encryption");
                    self.open_encrypted_session().await?;
                    negotiated = true;
                }
                _ => {
                    return command
                        .deserialize(&self.environment, response)
                        .map_err(|e| TaskError::command(step, e));
                }
            }
        }
    }

    /// Close the link if it is still owed a disconnect
    ///
    /// The session ends `Idle` on success and `Aborted` otherwise.
    pub async fn finish(&mut self, succeeded: bool) {
        if self.link_open {
            self.link_open = false;
            self.state = SessionState::Disconnecting;
            if let Some(transport) = self.transport.as_deref_mut() {
                transport.disconnect().await;
            }
            debug!("Disconnected from card");
        }
        self.state = if succeeded {
            SessionState::Idle
        } else {
            SessionState::Aborted
        };
    }

    async fn open_encrypted_session(&mut self) -> Result<(), TaskError> {
        self.negotiate_key()
            .await
            .map_err(|e| e.at_step("open_session"))
    }

    async fn negotiate_key(&mut self) -> Result<(), TaskError> {
        let secret = crypto::generate_ephemeral();
        let command = OpenSessionCommand::new(secret.public_key());
        let step = command.name();

        let apdu = command
            .serialize(&self.environment)
            .map_err(|e| TaskError::command(step, e))?;
        let response = self.exchange(step, &apdu).await?;
        let response = command
            .deserialize(&self.environment, response)
            .map_err(|e| TaskError::command(step, e))?;

        let key = crypto::derive_session_key(&secret, &response.card_key);
        self.environment.set_session_key(EncryptionMode::Strong, key);
        debug!("Encrypted session established");
        Ok(())
    }

    /// One round trip: encrypt, frame, transmit with resends, unframe, decrypt
    async fn exchange(
        &mut self,
        step: &'static str,
        apdu: &CommandApdu,
    ) -> Result<ResponseApdu, TaskError> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Cancelled.into());
        }
        let key = match apdu.instruction() {
            Instruction::OpenSession => None,
            _ => self.environment.encryption_key(),
        };
        let outbound = match key {
            Some(key) => apdu
                .encrypt(self.environment.encryption_mode(), key.as_bytes())
                .map_err(|e| TaskError::command(step, e.into()))?,
            None => apdu.clone(),
        };

        let Some(transport) = self.transport.as_deref_mut() else {
            return Err(SessionError::Aborted("reader released").into());
        };
        self.state = SessionState::Exchanging;
        let result = transmit_with_retries(
            transport,
            &outbound,
            key,
            &self.config,
            &self.cancel,
            self.delegate.as_ref(),
        )
        .await;
        self.state = SessionState::Connected;

        let response = result?;
        let status = response.status();
        match status.tracing_level() {
            Level::DEBUG => debug!(%status, "Card answered"),
            Level::INFO => info!(%status, "Card answered"),
            _ => warn!(%status, "Card answered"),
        }
        Ok(response)
    }

    fn remaining_delay(&self, response: &ResponseApdu) -> Duration {
        response
            .tlv()
            .ok()
            .and_then(|tlv| tlv.optional::<u16>(Tag::Pause).ok().flatten())
            .map_or(self.config.default_security_delay, |units| {
                PAUSE_UNIT * u32::from(units)
            })
    }
}

async fn wait(cancel: &CancelToken, delay: Duration) -> Result<(), SessionError> {
    tokio::select! {
        () = tokio::time::sleep(delay) => Ok(()),
        () = cancel.cancelled() => Err(SessionError::Cancelled),
    }
}

async fn transmit_with_retries<T: CardTransport>(
    transport: &mut T,
    apdu: &CommandApdu,
    key: Option<&SessionKey>,
    config: &SessionConfig,
    cancel: &CancelToken,
    delegate: &dyn SessionDelegate,
) -> Result<ResponseApdu, SessionError> {
    let checksum = transport.requires_checksum();
    let frame = apdu.to_frame(checksum);
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        attempts += 1;

        let result = match tokio::time::timeout(config.exchange_timeout, transport.transmit(&frame))
            .await
        {
            Ok(Ok(bytes)) => ResponseApdu::from_frame(&bytes, checksum)
                .and_then(|response| match key {
                    Some(key) => response.decrypt(key.as_bytes()),
                    None => Ok(response),
                })
                .map_err(LinkFault::from),
            Ok(Err(e)) => Err(LinkFault::from(e)),
            Err(_) => Err(LinkFault::from(TransportError::Timeout)),
        };

        if cancel.is_cancelled() {
            debug!("Discarding result that arrived after cancellation");
            return Err(SessionError::Cancelled);
        }

        match result {
            Ok(response) => return Ok(response),
            Err(fault) if fault.is_transient() && attempts <= config.max_transport_retries => {
                warn!(attempt = attempts, error = %fault, "Transient link fault, resending");
            }
            Err(fault) => {
                if fault == LinkFault::Transport(TransportError::TagLost) {
                    delegate.on_tag_lost();
                }
                return Err(SessionError::TransportFailure {
                    attempts,
                    source: fault,
                });
            }
        }
    }
}

impl<T: CardTransport + 'static> Drop for CardSession<T> {
    fn drop(&mut self) {
        if !self.link_open {
            return;
        }
        let Some(mut transport) = self.transport.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                debug!("Session dropped with an open link, disconnecting");
                handle.spawn(async move {
                    transport.disconnect().await;
                });
            }
            Err(_) => warn!("Session dropped outside a runtime, link left open"),
        }
    }
}

#[cfg(test)]
mod tests {
    use tapcard_apdu_core::FrameError;

    use super::*;
    use crate::{
        commands::CheckWalletCommand,
        environment::CardEnvironment,
        testing::{EmulatedCard, card_id},
    };

    fn session(card: &EmulatedCard, config: SessionConfig) -> CardSession<EmulatedCard> {
        let guard = CardReader::new(card.clone()).try_acquire().unwrap();
        CardSession::new(
            guard,
            CardEnvironment::new(),
            config,
            Arc::new(SilentDelegate),
            CancelToken::new(),
        )
    }

    #[tokio::test]
    async fn test_start_reads_card() {
        let card = EmulatedCard::loaded();
        let mut session = session(&card, SessionConfig::default());
        assert_eq!(session.state(), SessionState::Idle);

        let read = session.start().await.unwrap().clone();
        assert_eq!(read.card_id, card_id());
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.environment().card_id(), Some(&card_id()));
        assert!(!session.environment_changed());

        session.finish(true).await;
        session.finish(true).await;
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(card.state().disconnects, 1);
    }

    #[tokio::test]
    async fn test_transient_faults_are_resent() {
        let card = EmulatedCard::loaded();
        card.state().timeouts = 2;
        let mut session = session(&card, SessionConfig::default());

        session.start().await.unwrap();
        assert_eq!(card.state().frames, 3);
        session.finish(true).await;
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let card = EmulatedCard::loaded();
        card.state().timeouts = 10;
        let mut session = session(&card, SessionConfig::new().with_max_transport_retries(2));

        let err = session.start().await.unwrap_err();
        assert_eq!(
            err,
            TaskError::Session {
                step: Some("read"),
                source: SessionError::TransportFailure {
                    attempts: 3,
                    source: LinkFault::Transport(TransportError::Timeout),
                },
            }
        );
        session.finish(false).await;
        assert_eq!(session.state(), SessionState::Aborted);
        let state = card.state();
        assert_eq!(state.frames, 3);
        assert_eq!(state.disconnects, 1);
    }

    #[tokio::test]
    async fn test_corrupted_frame_is_resent() {
        let card = EmulatedCard::loaded();
        {
            let mut state = card.state();
            state.checksum = true;
            state.corrupt_frames = 1;
        }
        let mut session = session(&card, SessionConfig::default());
        session.start().await.unwrap();
        assert_eq!(card.state().frames, 2);

        card.state().corrupt_frames = 10;
        let command = CheckWalletCommand::new(card_id());
        let err = session.send(&command).await.unwrap_err();
        assert!(matches!(
            err,
            TaskError::Session {
                step: Some("check_wallet"),
                source: SessionError::TransportFailure {
                    attempts: 4,
                    source: LinkFault::Frame(FrameError::Checksum { .. }),
                },
            }
        ));
        session.finish(false).await;
    }

    #[tokio::test]
    async fn test_key_negotiation_failure_names_its_exchange() {
        let card = EmulatedCard::loaded();
        {
            let mut state = card.state();
            state.require_encryption = true;
            state.drop_link_at_frame = Some(3);
        }
        let mut session = session(&card, SessionConfig::default());
        session.start().await.unwrap();

        let err = session
            .send(&CheckWalletCommand::new(card_id()))
            .await
            .unwrap_err();
        assert_eq!(err.step(), Some("open_session"));
        assert!(matches!(
            err.session(),
            Some(SessionError::TransportFailure { attempts: 1, .. })
        ));
        assert_eq!(
            card.state().instructions,
            vec![Instruction::Read, Instruction::CheckWallet, Instruction::OpenSession]
        );
        session.finish(false).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_exchange_times_out() {
        let card = EmulatedCard::loaded();
        card.state().stalls = 1;
        let config = SessionConfig::new().with_exchange_timeout(Duration::from_secs(1));
        let mut session = session(&card, config);

        let started = tokio::time::Instant::now();
        session.start().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(card.state().frames, 2);
        session.finish(true).await;
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let card = EmulatedCard::loaded();
        let mut session = session(&card, SessionConfig::default());
        session.cancel.cancel();

        assert_eq!(
            session.start().await.unwrap_err(),
            TaskError::from(SessionError::Cancelled)
        );
        assert_eq!(card.state().connects, 0);
    }

    #[tokio::test]
    async fn test_drop_disconnects() {
        let card = EmulatedCard::loaded();
        let reader = CardReader::new(card.clone());
        {
            let mut session = CardSession::new(
                reader.try_acquire().unwrap(),
                CardEnvironment::new(),
                SessionConfig::default(),
                Arc::new(SilentDelegate),
                CancelToken::new(),
            );
            session.start().await.unwrap();
        }
        for _ in 0..10 {
            if card.state().disconnects > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(card.state().disconnects, 1);
        assert!(!reader.is_busy());
    }
}
