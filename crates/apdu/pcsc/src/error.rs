//! Error types for the PC/SC transport

use tapcard_apdu_core::TransportError;

/// PC/SC-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PcscError {
    /// PC/SC error
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// No readers available
    #[error("no readers available")]
    NoReadersAvailable,

    /// Reader not found
    #[error("reader not found: {0}")]
    ReaderNotFound(String),

    /// No card present in reader
    #[error("no card present in reader: {0}")]
    NoCard(String),

    /// Card was removed
    #[error("card was removed")]
    CardRemoved,

    /// Blocking task failed
    #[error("reader task failed: {0}")]
    Task(String),
}

impl From<pcsc::Error> for TransportError {
    fn from(error: pcsc::Error) -> Self {
        match error {
            pcsc::Error::RemovedCard | pcsc::Error::ResetCard => Self::TagLost,
            pcsc::Error::NoSmartcard => Self::NotPresent,
            pcsc::Error::Timeout => Self::Timeout,
            pcsc::Error::CommError | pcsc::Error::NotTransacted => {
                Self::Transmission(error.to_string())
            }
            other => Self::Driver(other as i64),
        }
    }
}

impl From<PcscError> for TransportError {
    fn from(error: PcscError) -> Self {
        match error {
            PcscError::Pcsc(e) => e.into(),
            PcscError::NoCard(_) => Self::NotPresent,
            PcscError::CardRemoved => Self::TagLost,
            PcscError::NoReadersAvailable | PcscError::ReaderNotFound(_) => {
                Self::Connection(error.to_string())
            }
            PcscError::Task(reason) => Self::Transmission(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_mapping() {
        assert_eq!(
            TransportError::from(pcsc::Error::RemovedCard),
            TransportError::TagLost
        );
        assert_eq!(
            TransportError::from(PcscError::NoCard("ACR122U".into())),
            TransportError::NotPresent
        );
        assert!(TransportError::from(pcsc::Error::CommError).is_transient());
        assert!(matches!(
            TransportError::from(PcscError::ReaderNotFound("x".into())),
            TransportError::Connection(_)
        ));
    }
}
