//! Conversions between TLV values and Rust types

use bytes::Bytes;

/// Type that can be read from a raw TLV value
///
/// Implementations return `None` when the bytes do not describe a valid
/// value; the caller turns that into a `TypeMismatch` naming the tag.
pub trait FromTlvValue: Sized {
    /// Name used in mismatch errors
    const EXPECTED: &'static str;

    /// Parse the raw value
    fn from_value(value: &[u8]) -> Option<Self>;
}

/// Type that can be written as a raw TLV value
pub trait IntoTlvValue {
    /// Produce the raw value bytes
    fn into_value(self) -> Bytes;
}

impl FromTlvValue for Bytes {
    const EXPECTED: &'static str = "bytes";

    fn from_value(value: &[u8]) -> Option<Self> {
        Some(Self::copy_from_slice(value))
    }
}

impl FromTlvValue for Vec<u8> {
    const EXPECTED: &'static str = "bytes";

    fn from_value(value: &[u8]) -> Option<Self> {
        Some(value.to_vec())
    }
}

impl FromTlvValue for String {
    const EXPECTED: &'static str = "utf-8 string";

    fn from_value(value: &[u8]) -> Option<Self> {
        // Firmware pads some strings with trailing NULs
        let end = value.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        std::str::from_utf8(&value[..end]).ok().map(str::to_owned)
    }
}

impl FromTlvValue for u8 {
    const EXPECTED: &'static str = "u8";

    fn from_value(value: &[u8]) -> Option<Self> {
        match value {
            [b] => Some(*b),
            _ => None,
        }
    }
}

impl FromTlvValue for u16 {
    const EXPECTED: &'static str = "u16";

    fn from_value(value: &[u8]) -> Option<Self> {
        value.try_into().ok().map(Self::from_be_bytes)
    }
}

impl FromTlvValue for u32 {
    const EXPECTED: &'static str = "u32";

    fn from_value(value: &[u8]) -> Option<Self> {
        value.try_into().ok().map(Self::from_be_bytes)
    }
}

impl FromTlvValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: &[u8]) -> Option<Self> {
        u8::from_value(value).map(|b| b != 0)
    }
}

impl IntoTlvValue for Bytes {
    fn into_value(self) -> Bytes {
        self
    }
}

impl IntoTlvValue for Vec<u8> {
    fn into_value(self) -> Bytes {
        Bytes::from(self)
    }
}

impl IntoTlvValue for &[u8] {
    fn into_value(self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl<const N: usize> IntoTlvValue for &[u8; N] {
    fn into_value(self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl IntoTlvValue for &Bytes {
    fn into_value(self) -> Bytes {
        self.clone()
    }
}

impl IntoTlvValue for &str {
    fn into_value(self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl IntoTlvValue for u8 {
    fn into_value(self) -> Bytes {
        Bytes::copy_from_slice(&[self])
    }
}

impl IntoTlvValue for u16 {
    fn into_value(self) -> Bytes {
        Bytes::copy_from_slice(&self.to_be_bytes())
    }
}

impl IntoTlvValue for u32 {
    fn into_value(self) -> Bytes {
        Bytes::copy_from_slice(&self.to_be_bytes())
    }
}

impl IntoTlvValue for bool {
    fn into_value(self) -> Bytes {
        u8::from(self).into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_integers() {
        assert_eq!(u16::from_value(&[0x01, 0x02]), Some(0x0102));
        assert_eq!(u16::from_value(&[0x01]), None);
        assert_eq!(u32::from_value(&[0, 0, 0x01, 0x00]), Some(256));
        assert_eq!(u32::from_value(&[0, 1]), None);
        assert_eq!(u8::from_value(&[]), None);
    }

    #[test]
    fn test_string_trims_padding() {
        assert_eq!(String::from_value(b"4.52r\0\0"), Some("4.52r".to_string()));
        assert_eq!(String::from_value(&[0xFF, 0xFE]), None);
        assert_eq!(String::from_value(&[]), Some(String::new()));
    }

    #[test]
    fn test_into_value() {
        assert_eq!(0x1234u16.into_value().as_ref(), &[0x12, 0x34]);
        assert_eq!(true.into_value().as_ref(), &[0x01]);
        assert_eq!("ab".into_value().as_ref(), b"ab");
    }
}
