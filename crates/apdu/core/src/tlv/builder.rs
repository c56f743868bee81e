use bytes::Bytes;

use super::{EncodeError, IntoTlvValue, Tag, Tlv, encode};

/// Ordered builder for outbound TLV payloads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvBuilder {
    records: Vec<Tlv>,
}

impl TlvBuilder {
    /// Create an empty builder
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Append a record
    pub fn append(mut self, tag: Tag, value: impl IntoTlvValue) -> Self {
        self.records.push(Tlv::new(tag, value.into_value()));
        self
    }

    /// Append a record only when a value is present
    pub fn append_optional<V: IntoTlvValue>(self, tag: Tag, value: Option<V>) -> Self {
        match value {
            Some(value) => self.append(tag, value),
            None => self,
        }
    }

    /// Records appended so far
    pub fn records(&self) -> &[Tlv] {
        &self.records
    }

    /// Consume the builder, returning the records
    pub fn build(self) -> Vec<Tlv> {
        self.records
    }

    /// Encode the records
    pub fn serialize(&self) -> Result<Bytes, EncodeError> {
        encode(&self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_order() {
        let payload = TlvBuilder::new()
            .append(Tag::Pin, &[0x01u8, 0x02])
            .append_optional::<u32>(Tag::IssuerDataCounter, None)
            .append_optional(Tag::Offset, Some(0x0200u16))
            .serialize()
            .unwrap();

        assert_eq!(
            payload.as_ref(),
            &[0x10, 0x02, 0x01, 0x02, 0x24, 0x02, 0x02, 0x00]
        );
    }
}
