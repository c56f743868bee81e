use std::str::FromStr;

use derive_more::Display;
use tapcard_apdu_core::tlv::FromTlvValue;

/// Curve of the wallet key
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EllipticCurve {
    /// secp256k1 with SHA-256 ECDSA
    #[display("secp256k1")]
    Secp256k1,
    /// Ed25519
    #[display("ed25519")]
    Ed25519,
    /// NIST P-256 with SHA-256 ECDSA
    #[display("secp256r1")]
    Secp256r1,
}

impl FromStr for EllipticCurve {
    type Err = UnknownCurve;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "secp256k1" => Ok(Self::Secp256k1),
            "ed25519" => Ok(Self::Ed25519),
            "secp256r1" => Ok(Self::Secp256r1),
            _ => Err(UnknownCurve(s.to_owned())),
        }
    }
}

/// Curve name outside the supported set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown curve {0:?}")]
pub struct UnknownCurve(pub String);

impl FromTlvValue for EllipticCurve {
    const EXPECTED: &'static str = "curve name";

    fn from_value(value: &[u8]) -> Option<Self> {
        String::from_value(value).and_then(|name| name.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(
            EllipticCurve::from_value(b"secp256k1\0"),
            Some(EllipticCurve::Secp256k1)
        );
        assert_eq!("ED25519".parse(), Ok(EllipticCurve::Ed25519));
        assert_eq!(EllipticCurve::from_value(b"curve25519"), None);
        assert_eq!(EllipticCurve::Secp256r1.to_string(), "secp256r1");
    }
}
