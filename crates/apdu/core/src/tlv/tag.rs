//! Tag space understood by the card firmware

use std::fmt;

macro_rules! tags {
    ($( $(#[$doc:meta])* $name:ident = $code:literal ),+ $(,)?) => {
        /// One-byte TLV tag
        ///
        /// Tags the firmware may send but this crate does not know about decode
        /// as [`Tag::Unknown`] and are carried through untouched.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Tag {
            $( $(#[$doc])* $name, )+
            /// Tag byte outside the known set
            Unknown(u8),
        }

        impl Tag {
            /// Wire value of this tag
            pub const fn code(self) -> u8 {
                match self {
                    $( Self::$name => $code, )+
                    Self::Unknown(code) => code,
                }
            }

            /// Map a wire byte to a tag
            pub const fn from_code(code: u8) -> Self {
                match code {
                    $( $code => Self::$name, )+
                    other => Self::Unknown(other),
                }
            }

            /// Human readable tag name
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name), )+
                    Self::Unknown(_) => "Unknown",
                }
            }
        }
    };
}

tags! {
    /// Card identifier, 8 bytes rendered as hex
    CardId = 0x01,
    /// Card lifecycle status
    Status = 0x02,
    /// Card attestation public key
    CardPublicKey = 0x03,
    /// Wallet curve name
    CurveId = 0x05,
    /// Signing method bitmask
    SigningMethod = 0x07,
    /// Maximum number of signatures
    MaxSignatures = 0x08,
    /// Settings bitmask
    SettingsMask = 0x0A,
    /// Nested card data
    CardData = 0x0C,
    /// Card health indicator
    Health = 0x0F,
    /// SHA-256 of PIN1
    Pin = 0x10,
    /// SHA-256 of PIN2
    Pin2 = 0x11,
    /// Host challenge
    Challenge = 0x16,
    /// Card salt
    Salt = 0x17,
    /// Host ephemeral public key
    SessionKeyA = 0x1A,
    /// Card ephemeral public key
    SessionKeyB = 0x1B,
    /// Remaining security delay in 10 ms units
    Pause = 0x1C,
    /// Manufacturer name
    ManufacturerName = 0x20,
    /// Sub-mode selector for multi-step commands
    Mode = 0x23,
    /// Byte offset
    Offset = 0x24,
    /// Total size
    Size = 0x25,
    /// Legacy mode marker
    LegacyMode = 0x29,
    /// Issuer key for issuer data
    IssuerDataPublicKey = 0x30,
    /// Issuer key for transactions
    IssuerTransactionPublicKey = 0x31,
    /// Issuer data blob
    IssuerData = 0x32,
    /// Issuer signature over the issuer data
    IssuerDataSignature = 0x33,
    /// Issuer data replay counter
    IssuerDataCounter = 0x35,
    /// Activation flag
    IsActivated = 0x3A,
    /// Concatenated hashes to sign
    TransactionOutHash = 0x50,
    /// Size of every hash in `TransactionOutHash`
    TransactionOutHashSize = 0x51,
    /// Wallet public key
    WalletPublicKey = 0x60,
    /// Wallet signature(s)
    WalletSignature = 0x61,
    /// Signatures left on the wallet
    WalletRemainingSignatures = 0x62,
    /// Hashes signed so far
    WalletSignedHashes = 0x63,
    /// Firmware version string
    Firmware = 0x80,
    /// Batch identifier
    Batch = 0x81,
    /// Manufacture date
    ManufactureDateTime = 0x82,
    /// Issuer name
    IssuerName = 0x83,
    /// Blockchain name
    BlockchainName = 0x84,
    /// Manufacturer signature over the card
    ManufacturerSignature = 0x86,
    /// Product mask
    ProductMask = 0x8A,
}

impl Tag {
    /// Whether the tag is part of the known set
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<u8> for Tag {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

impl From<Tag> for u8 {
    fn from(tag: Tag) -> Self {
        tag.code()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(Tag::from_code(0x01), Tag::CardId);
        assert_eq!(Tag::from_code(0x1C), Tag::Pause);
        assert_eq!(Tag::from_code(0x8A), Tag::ProductMask);
        assert_eq!(Tag::WalletSignature.code(), 0x61);
    }

    #[test]
    fn test_every_code_maps_back() {
        for code in 0..=u8::MAX {
            assert_eq!(Tag::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_unknown_display() {
        let tag = Tag::from_code(0x77);
        assert!(!tag.is_known());
        assert_eq!(tag.to_string(), "Unknown(0x77)");
        assert_eq!(Tag::Salt.to_string(), "Salt(0x17)");
    }
}
