use super::{DecodeError, FromTlvValue, Tag, Tlv, TlvError, decode};

/// Decoded TLV sequence with typed accessors
///
/// Lookups return the first record carrying a tag; order and duplicates are
/// preserved for callers that iterate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvSet {
    records: Vec<Tlv>,
}

impl TlvSet {
    /// Decode a byte stream
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode(bytes).map(Self::from_records)
    }

    /// Wrap already decoded records
    pub const fn from_records(records: Vec<Tlv>) -> Self {
        Self { records }
    }

    /// First record with `tag`
    pub fn get(&self, tag: Tag) -> Option<&Tlv> {
        self.records.iter().find(|record| record.tag() == tag)
    }

    /// Whether a record with `tag` is present
    pub fn contains(&self, tag: Tag) -> bool {
        self.get(tag).is_some()
    }

    /// Read a required value
    pub fn value<T: FromTlvValue>(&self, tag: Tag) -> Result<T, TlvError> {
        self.optional(tag)?.ok_or(TlvError::MissingTag(tag))
    }

    /// Read an optional value; present but malformed is still an error
    pub fn optional<T: FromTlvValue>(&self, tag: Tag) -> Result<Option<T>, TlvError> {
        self.get(tag)
            .map(|record| {
                T::from_value(record.value()).ok_or(TlvError::TypeMismatch {
                    tag,
                    expected: T::EXPECTED,
                    length: record.value().len(),
                })
            })
            .transpose()
    }

    /// All records in wire order
    pub fn records(&self) -> &[Tlv] {
        &self.records
    }

    /// Records with tags outside the known set
    pub fn unknown(&self) -> impl Iterator<Item = &Tlv> {
        self.records.iter().filter(|record| !record.tag().is_known())
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the set, returning the records
    pub fn into_records(self) -> Vec<Tlv> {
        self.records
    }
}

impl FromTlvValue for TlvSet {
    const EXPECTED: &'static str = "nested tlv";

    fn from_value(value: &[u8]) -> Option<Self> {
        Self::decode(value).ok()
    }
}
