use std::sync::Arc;

use tapcard_apdu_core::CardTransport;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::SessionError;

/// Shared handle to one reader
///
/// Holding the guard returned by [`CardReader::try_acquire`] is what makes a
/// session active; a second attempt fails instead of queueing.
#[derive(Debug)]
pub struct CardReader<T> {
    transport: Arc<Mutex<T>>,
}

impl<T> Clone for CardReader<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: CardTransport + 'static> CardReader<T> {
    /// Wrap a transport so sessions can take turns on it
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(Mutex::new(transport)),
        }
    }

    /// Whether a session currently owns the reader
    pub fn is_busy(&self) -> bool {
        self.transport.try_lock().is_err()
    }

    pub(crate) fn try_acquire(&self) -> Result<OwnedMutexGuard<T>, SessionError> {
        Arc::clone(&self.transport)
            .try_lock_owned()
            .map_err(|_| SessionError::SessionBusy)
    }
}
