mod card;
mod card_id;
mod curve;
mod settings;
mod status;

pub use card::{Card, CardData, FirmwareVersion, ManufactureDate};
pub use card_id::CardId;
pub use curve::{EllipticCurve, UnknownCurve};
pub use settings::{Setting, SettingsMask};
pub use status::CardStatus;
