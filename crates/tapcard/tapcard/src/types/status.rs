use derive_more::Display;
use tapcard_apdu_core::tlv::FromTlvValue;

/// Wallet lifecycle state reported by the card
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardStatus {
    /// Factory state, not usable yet
    #[display("not personalized")]
    NotPersonalized,
    /// No wallet key
    #[display("empty")]
    Empty,
    /// Wallet key present
    #[display("loaded")]
    Loaded,
    /// Wallet key destroyed on a non-reusable card; terminal
    #[display("purged")]
    Purged,
}

impl CardStatus {
    /// Wire value
    pub const fn code(self) -> u8 {
        match self {
            Self::NotPersonalized => 0,
            Self::Empty => 1,
            Self::Loaded => 2,
            Self::Purged => 3,
        }
    }

    /// Status for a wire value
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NotPersonalized),
            1 => Some(Self::Empty),
            2 => Some(Self::Loaded),
            3 => Some(Self::Purged),
            _ => None,
        }
    }
}

impl FromTlvValue for CardStatus {
    const EXPECTED: &'static str = "card status";

    fn from_value(value: &[u8]) -> Option<Self> {
        u8::from_value(value).and_then(Self::from_code)
    }
}
