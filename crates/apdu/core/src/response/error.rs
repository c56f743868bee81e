//! Frame-level errors

/// Failure to parse, verify or decrypt a frame
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Link checksum or inner payload checksum mismatch
    #[error("checksum mismatch: expected {expected:#06x}, computed {actual:#06x}")]
    Checksum {
        /// Checksum carried by the frame
        expected: u16,
        /// Checksum computed over the received bytes
        actual: u16,
    },

    /// Frame too short or with an inconsistent length field
    #[error("malformed frame of {length} bytes")]
    Malformed {
        /// Frame length
        length: usize,
    },

    /// Payload could not be encrypted or decrypted
    #[error("payload encryption failed: {0}")]
    Encryption(&'static str),

    /// INS byte outside the known instruction set
    #[error("unknown instruction {0:#04x}")]
    UnknownInstruction(u8),
}

impl FrameError {
    /// Whether resending the same frame may succeed
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Checksum { .. } | Self::Malformed { .. })
    }
}
