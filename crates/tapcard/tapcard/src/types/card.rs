use std::fmt;

use bytes::Bytes;
use derive_more::Display;
use tapcard_apdu_core::tlv::{FromTlvValue, Tag, TlvError, TlvSet};

use super::{CardId, CardStatus, EllipticCurve, Setting, SettingsMask};

/// Firmware version, e.g. `4.52r`
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{major}.{minor}{suffix}")]
pub struct FirmwareVersion {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Build type suffix (`r` release, `d` debug, `sdk`)
    pub suffix: String,
}

impl FirmwareVersion {
    /// Parse `major.minor[suffix]`
    pub fn parse(s: &str) -> Option<Self> {
        let (major, rest) = s.trim().split_once('.')?;
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (minor, suffix) = rest.split_at(digits);
        Some(Self {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
            suffix: suffix.trim().to_owned(),
        })
    }
}

impl FromTlvValue for FirmwareVersion {
    const EXPECTED: &'static str = "firmware version";

    fn from_value(value: &[u8]) -> Option<Self> {
        String::from_value(value).and_then(|s| Self::parse(&s))
    }
}

/// Manufacture date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display("{year:04}-{month:02}-{day:02}")]
pub struct ManufactureDate {
    /// Year
    pub year: u16,
    /// Month, 1 to 12
    pub month: u8,
    /// Day of month
    pub day: u8,
}

impl FromTlvValue for ManufactureDate {
    const EXPECTED: &'static str = "date";

    fn from_value(value: &[u8]) -> Option<Self> {
        match value {
            [hi, lo, month, day] => Some(Self {
                year: u16::from_be_bytes([*hi, *lo]),
                month: *month,
                day: *day,
            }),
            _ => None,
        }
    }
}

/// Manufacturing data nested under the `CardData` tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardData {
    /// Production batch
    pub batch_id: Option<String>,
    /// Manufacture date
    pub manufacture_date: Option<ManufactureDate>,
    /// Issuer name
    pub issuer_name: Option<String>,
    /// Blockchain the card was issued for
    pub blockchain_name: Option<String>,
    /// Manufacturer signature over the card data
    pub manufacturer_signature: Option<Bytes>,
    /// Product mask
    pub product_mask: Option<u8>,
}

impl TryFrom<&TlvSet> for CardData {
    type Error = TlvError;

    fn try_from(tlv: &TlvSet) -> Result<Self, Self::Error> {
        Ok(Self {
            batch_id: tlv.optional::<Bytes>(Tag::Batch)?.map(hex::encode_upper),
            manufacture_date: tlv.optional(Tag::ManufactureDateTime)?,
            issuer_name: tlv.optional(Tag::IssuerName)?,
            blockchain_name: tlv.optional(Tag::BlockchainName)?,
            manufacturer_signature: tlv.optional(Tag::ManufacturerSignature)?,
            product_mask: tlv.optional(Tag::ProductMask)?,
        })
    }
}

/// Card information returned by the Read command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    /// Card that answered
    pub card_id: CardId,
    /// Manufacturer name
    pub manufacturer_name: Option<String>,
    /// Wallet lifecycle state
    pub status: CardStatus,
    /// Firmware version
    pub firmware_version: Option<FirmwareVersion>,
    /// Card attestation key
    pub card_public_key: Option<Bytes>,
    /// Personalization settings
    pub settings_mask: SettingsMask,
    /// Key verifying the issuer data
    pub issuer_data_public_key: Option<Bytes>,
    /// Issuer transaction key
    pub issuer_transaction_public_key: Option<Bytes>,
    /// Wallet curve
    pub curve: Option<EllipticCurve>,
    /// Signature limit of the wallet
    pub max_signatures: Option<u32>,
    /// Signing method mask
    pub signing_method: Option<u8>,
    /// Wallet public key
    pub wallet_public_key: Option<Bytes>,
    /// Signatures the wallet can still make
    pub wallet_remaining_signatures: Option<u32>,
    /// Hashes signed by the wallet so far
    pub wallet_signed_hashes: Option<u32>,
    /// Health indicator
    pub health: Option<u8>,
    /// Whether the card was activated
    pub is_activated: Option<bool>,
    /// Manufacturing data
    pub card_data: Option<CardData>,
}

impl Card {
    /// Whether a purge returns the card to `Empty` rather than `Purged`
    pub const fn is_reusable(&self) -> bool {
        self.settings_mask.contains(Setting::IsReusable)
    }

    /// Curve and public key of the wallet, when the card holds one
    pub fn wallet(&self) -> Option<(EllipticCurve, &Bytes)> {
        match (self.curve, &self.wallet_public_key) {
            (Some(curve), Some(key)) if self.status == CardStatus::Loaded => Some((curve, key)),
            _ => None,
        }
    }
}

impl TryFrom<&TlvSet> for Card {
    type Error = TlvError;

    fn try_from(tlv: &TlvSet) -> Result<Self, Self::Error> {
        let card_data = tlv
            .optional::<TlvSet>(Tag::CardData)?
            .map(|nested| CardData::try_from(&nested))
            .transpose()?;

        Ok(Self {
            card_id: tlv.value(Tag::CardId)?,
            manufacturer_name: tlv.optional(Tag::ManufacturerName)?,
            status: tlv.value(Tag::Status)?,
            firmware_version: tlv.optional(Tag::Firmware)?,
            card_public_key: tlv.optional(Tag::CardPublicKey)?,
            settings_mask: tlv.optional(Tag::SettingsMask)?.unwrap_or_default(),
            issuer_data_public_key: tlv.optional(Tag::IssuerDataPublicKey)?,
            issuer_transaction_public_key: tlv.optional(Tag::IssuerTransactionPublicKey)?,
            curve: tlv.optional(Tag::CurveId)?,
            max_signatures: tlv.optional(Tag::MaxSignatures)?,
            signing_method: tlv.optional(Tag::SigningMethod)?,
            wallet_public_key: tlv.optional(Tag::WalletPublicKey)?,
            wallet_remaining_signatures: tlv.optional(Tag::WalletRemainingSignatures)?,
            wallet_signed_hashes: tlv.optional(Tag::WalletSignedHashes)?,
            health: tlv.optional(Tag::Health)?,
            is_activated: tlv.optional(Tag::IsActivated)?,
            card_data,
        })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Card ID: {}", self.card_id)?;
        if let Some(name) = &self.manufacturer_name {
            writeln!(f, "Manufacturer: {name}")?;
        }
        writeln!(f, "Status: {}", self.status)?;
        if let Some(version) = &self.firmware_version {
            writeln!(f, "Firmware: {version}")?;
        }
        writeln!(f, "Settings: {}", self.settings_mask)?;
        if let Some(curve) = self.curve {
            writeln!(f, "Curve: {curve}")?;
        }
        if let Some(key) = &self.wallet_public_key {
            writeln!(f, "Wallet public key: {}", hex::encode(key))?;
        }
        if let Some(remaining) = self.wallet_remaining_signatures {
            writeln!(f, "Remaining signatures: {remaining}")?;
        }
        if let Some(data) = &self.card_data {
            if let Some(batch) = &data.batch_id {
                writeln!(f, "Batch: {batch}")?;
            }
            if let Some(date) = data.manufacture_date {
                writeln!(f, "Manufactured: {date}")?;
            }
            if let Some(issuer) = &data.issuer_name {
                writeln!(f, "Issuer: {issuer}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapcard_apdu_core::tlv::TlvBuilder;

    fn read_payload(status: u8) -> TlvSet {
        let card_data = TlvBuilder::new()
            .append(Tag::Batch, &[0x00u8, 0x08])
            .append(Tag::ManufactureDateTime, &[0x07u8, 0xE4, 0x03, 0x11])
            .append(Tag::IssuerName, "TEST ISSUER")
            .serialize()
            .unwrap();
        let bytes = TlvBuilder::new()
            .append(Tag::CardId, &[0xCBu8, 0x79, 0, 0, 0, 0x01, 0x01, 0x42])
            .append(Tag::ManufacturerName, "TAPCARD")
            .append(Tag::Status, status)
            .append(Tag::Firmware, "4.52r")
            .append(Tag::SettingsMask, 0x0001u16)
            .append(Tag::CurveId, "secp256k1")
            .append(Tag::WalletPublicKey, &[0x04u8; 65])
            .append(Tag::CardData, card_data)
            .append(Tag::Unknown(0xE1), &[0x01u8])
            .serialize()
            .unwrap();
        TlvSet::decode(&bytes).unwrap()
    }

    #[test]
    fn test_card_projection() {
        let card = Card::try_from(&read_payload(2)).unwrap();
        assert_eq!(card.card_id.to_string(), "CB79000000010142");
        assert_eq!(card.status, CardStatus::Loaded);
        assert_eq!(card.firmware_version.as_ref().unwrap().to_string(), "4.52r");
        assert!(card.is_reusable());
        assert!(card.wallet().is_some());

        let data = card.card_data.unwrap();
        assert_eq!(data.batch_id.as_deref(), Some("0008"));
        assert_eq!(data.manufacture_date.unwrap().to_string(), "2020-03-17");
    }

    #[test]
    fn test_bad_status_is_type_mismatch() {
        let err = Card::try_from(&read_payload(9)).unwrap_err();
        assert_eq!(err.tag(), Tag::Status);
    }

    #[test]
    fn test_firmware_parse() {
        let v = FirmwareVersion::parse("2.30sdk").unwrap();
        assert_eq!((v.major, v.minor, v.suffix.as_str()), (2, 30, "sdk"));
        assert!(FirmwareVersion::parse("garbage").is_none());
    }
}
