use std::fmt;

use tapcard_apdu_core::tlv::FromTlvValue;

/// Single settings flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    IsReusable = 0x0001,
    UseActivation = 0x0002,
    ProhibitPurgeWallet = 0x0004,
    UseBlock = 0x0008,
    AllowSetPin1 = 0x0010,
    AllowSetPin2 = 0x0020,
    UseCvc = 0x0040,
    ProhibitDefaultPin1 = 0x0080,
    UseOneCommandAtTime = 0x0100,
    UseNdef = 0x0200,
    UseDynamicNdef = 0x0400,
    SmartSecurityDelay = 0x0800,
    AllowUnencrypted = 0x1000,
    AllowFastEncryption = 0x2000,
    ProtectIssuerDataAgainstReplay = 0x4000,
    AllowSelectBlockchain = 0x8000,
    DisablePrecomputedNdef = 0x0001_0000,
    SkipSecurityDelayIfValidatedByIssuer = 0x0002_0000,
    SkipCheckPin2CvcIfValidatedByIssuer = 0x0004_0000,
    SkipSecurityDelayIfValidatedByLinkedTerminal = 0x0008_0000,
    RestrictOverwriteIssuerExtraData = 0x0010_0000,
    RequireTerminalTxSignature = 0x0100_0000,
    RequireTerminalCertSignature = 0x0200_0000,
    CheckPin3OnCard = 0x0400_0000,
}

impl Setting {
    const ALL: [Self; 24] = [
        Self::IsReusable,
        Self::UseActivation,
        Self::ProhibitPurgeWallet,
        Self::UseBlock,
        Self::AllowSetPin1,
        Self::AllowSetPin2,
        Self::UseCvc,
        Self::ProhibitDefaultPin1,
        Self::UseOneCommandAtTime,
        Self::UseNdef,
        Self::UseDynamicNdef,
        Self::SmartSecurityDelay,
        Self::AllowUnencrypted,
        Self::AllowFastEncryption,
        Self::ProtectIssuerDataAgainstReplay,
        Self::AllowSelectBlockchain,
        Self::DisablePrecomputedNdef,
        Self::SkipSecurityDelayIfValidatedByIssuer,
        Self::SkipCheckPin2CvcIfValidatedByIssuer,
        Self::SkipSecurityDelayIfValidatedByLinkedTerminal,
        Self::RestrictOverwriteIssuerExtraData,
        Self::RequireTerminalTxSignature,
        Self::RequireTerminalCertSignature,
        Self::CheckPin3OnCard,
    ];
}

/// Settings flags container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsMask(u32);

impl SettingsMask {
    /// Mask with exactly `settings` set
    pub fn new(settings: &[Setting]) -> Self {
        Self(settings.iter().fold(0, |flags, &s| flags | s as u32))
    }

    /// Raw bit value
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Whether `setting` is set
    pub const fn contains(&self, setting: Setting) -> bool {
        self.0 & setting as u32 != 0
    }
}

impl fmt::Display for SettingsMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = Setting::ALL
            .iter()
            .filter(|&&s| self.contains(s))
            .map(|s| format!("{s:?}"))
            .collect();
        write!(f, "{}", names.join(", "))
    }
}

impl From<u32> for SettingsMask {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl FromTlvValue for SettingsMask {
    const EXPECTED: &'static str = "settings mask";

    // Older firmware sends two bytes
    fn from_value(value: &[u8]) -> Option<Self> {
        match value.len() {
            2 => u16::from_value(value).map(|v| Self(v.into())),
            4 => u32::from_value(value).map(Self),
            _ => None,
        }
    }
}
