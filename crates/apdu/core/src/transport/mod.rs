//! Transport traits for communication with cards
//!
//! A transport moves raw frames to and from the card. It has no knowledge of
//! TLV payloads, encryption or status words; timeouts and retries belong to
//! the session driving it.

pub mod error;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
pub use error::TransportError;
use tracing::{debug, trace};

/// Link to a single card reader
#[async_trait]
pub trait CardTransport: fmt::Debug + Send + Sync {
    /// Open the link to the card in the field
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Deliver one frame
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Wait for the answer to the last frame
    async fn receive(&mut self) -> Result<Bytes, TransportError>;

    /// Close the link; never fails
    async fn disconnect(&mut self);

    /// Whether a card is currently in the field
    fn is_present(&self) -> bool;

    /// Whether frames carry a trailing CRC-16 on this link
    fn requires_checksum(&self) -> bool {
        false
    }

    /// Send a frame and wait for its answer
    async fn transmit(&mut self, frame: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = %hex::encode(frame), "Transmitting frame");
        self.send(frame).await?;
        let result = self.receive().await;
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode(response), "Received frame");
            }
            Err(e) => {
                debug!(error = %e, "Transport error during transmission");
            }
        }
        result
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
#[allow(missing_docs, unreachable_pub)]
pub struct MockTransport {
    /// Mock responses to return
    pub responses: Vec<Bytes>,
    /// Frames that were sent
    pub commands: Vec<Bytes>,
    /// Whether the transport is connected
    pub connected: bool,
}

#[cfg(test)]
impl MockTransport {
    /// Create a new mock transport with the given responses
    pub fn new(responses: Vec<Bytes>) -> Self {
        Self {
            responses,
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[async_trait]
impl CardTransport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.connected = true;
        Ok(())
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotPresent);
        }
        self.commands.push(Bytes::copy_from_slice(frame));
        Ok(())
    }

    async fn receive(&mut self) -> Result<Bytes, TransportError> {
        if self.responses.is_empty() {
            return Err(TransportError::Transmission("no response queued".into()));
        }
        Ok(self.responses.remove(0))
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_present(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transmit_pairs_send_and_receive() {
        let mut transport = MockTransport::new(vec![Bytes::from_static(&[0x90, 0x00])]);
        transport.connect().await.unwrap();

        let response = transport.transmit(&[0x00, 0xF2, 0x00, 0x00]).await.unwrap();
        assert_eq!(response.as_ref(), &[0x90, 0x00]);
        assert_eq!(transport.commands.len(), 1);
        assert!(!transport.requires_checksum());

        let err = transport.transmit(&[0x00]).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_send_without_connect() {
        let mut transport = MockTransport::default();
        assert_eq!(
            transport.send(&[0x00]).await.unwrap_err(),
            TransportError::NotPresent
        );
        transport.disconnect().await;
        assert!(!transport.is_present());
    }
}
