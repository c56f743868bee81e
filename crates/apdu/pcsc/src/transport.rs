//! PC/SC transport implementation

use std::{ffi::CString, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use pcsc::{Card, Context, Disposition, MAX_BUFFER_SIZE_EXTENDED, ReaderState, State};
use tapcard_apdu_core::{CardTransport, TransportError};
use tokio::task;
use tracing::{debug, warn};

use crate::{config::PcscConfig, error::PcscError, reader::is_present};

/// Transport implementation using PC/SC
pub struct PcscTransport {
    /// PC/SC context
    context: Context,
    /// Card connection, if established
    card: Option<Arc<Card>>,
    /// Reader name
    reader_name: String,
    reader_cstr: CString,
    /// Configuration
    config: PcscConfig,
    /// Frame waiting for `receive`
    pending: Option<Bytes>,
}

impl fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTransport")
            .field("reader_name", &self.reader_name)
            .field("has_card", &self.card.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PcscTransport {
    pub(crate) fn new(
        context: Context,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<Self, PcscError> {
        let reader_cstr = CString::new(reader_name)
            .map_err(|_| PcscError::ReaderNotFound(reader_name.to_owned()))?;
        Ok(Self {
            context,
            card: None,
            reader_name: reader_name.to_owned(),
            reader_cstr,
            config,
            pending: None,
        })
    }

    /// Get the reader name
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    /// Check if the transport holds a card connection
    pub const fn has_card(&self) -> bool {
        self.card.is_some()
    }

    fn connected_card(&self) -> Result<Arc<Card>, TransportError> {
        self.card.clone().ok_or(TransportError::NotPresent)
    }
}

async fn blocking<R: Send + 'static>(
    f: impl FnOnce() -> Result<R, pcsc::Error> + Send + 'static,
) -> Result<R, TransportError> {
    match task::spawn_blocking(f).await {
        Ok(result) => result.map_err(TransportError::from),
        Err(e) => Err(PcscError::Task(e.to_string()).into()),
    }
}

#[async_trait]
impl CardTransport for PcscTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.card.is_some() {
            return Ok(());
        }
        let context = self.context.clone();
        let reader = self.reader_cstr.clone();
        let share_mode: pcsc::ShareMode = self.config.share_mode.into();
        let protocols = self.config.protocols;

        let card = blocking(move || context.connect(&reader, share_mode, protocols)).await?;
        debug!(reader = %self.reader_name, "Connected to card");
        self.card = Some(Arc::new(card));
        Ok(())
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.connected_card()?;
        self.pending = Some(Bytes::copy_from_slice(frame));
        Ok(())
    }

    async fn receive(&mut self) -> Result<Bytes, TransportError> {
        let card = self.connected_card()?;
        let frame = self
            .pending
            .take()
            .ok_or_else(|| TransportError::Transmission("no frame sent".into()))?;

        let result = blocking(move || {
            let mut buffer = vec![0u8; MAX_BUFFER_SIZE_EXTENDED];
            card.transmit(&frame, &mut buffer).map(Bytes::copy_from_slice)
        })
        .await;

        if matches!(result, Err(TransportError::TagLost)) {
            self.card = None;
        }
        result
    }

    async fn disconnect(&mut self) {
        self.pending = None;
        let Some(card) = self.card.take() else {
            return;
        };
        match Arc::try_unwrap(card) {
            Ok(card) => {
                let result =
                    blocking(move || card.disconnect(Disposition::LeaveCard).map_err(|(_, e)| e))
                        .await;
                if let Err(e) = result {
                    warn!(error = %e, "Failed to disconnect from card");
                }
            }
            // A timed-out transmit still holds the card; it is released on drop
            Err(_) => debug!("Card handle still in use, leaving it to drop"),
        }
    }

    fn is_present(&self) -> bool {
        let mut states = [ReaderState::new(self.reader_cstr.as_c_str(), State::UNAWARE)];
        self.context
            .get_status_change(Some(Duration::ZERO), &mut states)
            .is_ok_and(|()| is_present(states[0].event_state()))
    }

    fn requires_checksum(&self) -> bool {
        self.config.raw_frames
    }
}
