use std::{fmt, str::FromStr};

use bytes::Bytes;
use tapcard_apdu_core::tlv::{FromTlvValue, IntoTlvValue};

/// Card identifier as printed on the card, 8 bytes shown as uppercase hex
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CardId(Bytes);

impl CardId {
    /// Wrap raw identifier bytes
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Raw identifier bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for CardId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(compact).map(Self::from_bytes)
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.0))
    }
}

impl fmt::Debug for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardId({self})")
    }
}

impl FromTlvValue for CardId {
    const EXPECTED: &'static str = "card id";

    fn from_value(value: &[u8]) -> Option<Self> {
        (!value.is_empty()).then(|| Self::from_bytes(Bytes::copy_from_slice(value)))
    }
}

impl IntoTlvValue for &CardId {
    fn into_value(self) -> Bytes {
        self.0.clone()
    }
}
