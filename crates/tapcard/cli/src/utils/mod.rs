//! Utility functions and types for the Tapcard CLI

pub mod display;
pub mod reader;
mod repository;

use std::{error::Error, io::Write, path::PathBuf, time::Duration};

use bytes::Bytes;
use clap::Args;
use colored::Colorize;
use tapcard::{CardEnvironment, CardId, Pin, SessionDelegate};

pub use repository::FileRepository;

/// Card selection, PINs and session options shared by every card command
#[derive(Args, Debug, Clone)]
pub struct CardArgs {
    /// Only talk to the card with this ID
    #[arg(long, global = true)]
    pub card_id: Option<String>,

    /// Access code
    #[arg(long, env = "TAPCARD_PIN1", default_value = tapcard::DEFAULT_PIN1, hide_env_values = true, global = true)]
    pub pin1: String,

    /// Passcode for wallet operations
    #[arg(long, env = "TAPCARD_PIN2", default_value = tapcard::DEFAULT_PIN2, hide_env_values = true, global = true)]
    pub pin2: String,

    /// File remembering per-card session settings
    #[arg(long, env = "TAPCARD_STATE_FILE", default_value = "tapcard-state.json", global = true)]
    pub state_file: PathBuf,

    /// Negotiate an encrypted session before the first command
    #[arg(long, global = true)]
    pub encrypt: bool,

    /// The reader expects the host to append the link CRC
    #[arg(long, global = true)]
    pub raw_frames: bool,
}

impl CardArgs {
    /// Template environment carrying the PINs
    pub fn environment(&self) -> CardEnvironment {
        CardEnvironment::new().with_pins(Pin::from_code(&self.pin1), Pin::from_code(&self.pin2))
    }

    /// Parsed `--card-id`
    pub fn card_id(&self) -> Result<Option<CardId>, Box<dyn Error>> {
        self.card_id
            .as_deref()
            .map(|id| id.parse::<CardId>().map_err(|e| format!("invalid card id {id:?}: {e}").into()))
            .transpose()
    }
}

/// Decode a hex argument, tolerating a `0x` prefix
pub fn parse_hex(name: &str, value: &str) -> Result<Bytes, Box<dyn Error>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| format!("{name} is not valid hex: {e}").into())
}

/// Delegate reporting session events on the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalDelegate;

impl SessionDelegate for TerminalDelegate {
    fn on_security_delay(&self, remaining: Duration) {
        eprint!(
            "\r{} {:>5.1}s ",
            "Security delay, keep the card on the reader:".yellow(),
            remaining.as_secs_f32()
        );
        let _ = std::io::stderr().flush();
    }

    fn on_tag_lost(&self) {
        eprintln!("\n{}", display::warning("Card left the field"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("hash", "0xA1b2").unwrap().as_ref(), &[0xA1, 0xB2]);
        assert_eq!(parse_hex("hash", "00ff").unwrap().as_ref(), &[0x00, 0xFF]);
        assert!(parse_hex("hash", "xyz").is_err());
    }

    #[test]
    fn test_card_id_argument() {
        let mut args = CardArgs {
            card_id: None,
            pin1: "000000".into(),
            pin2: "000".into(),
            state_file: PathBuf::from("state.json"),
            encrypt: false,
            raw_frames: false,
        };
        assert!(args.card_id().unwrap().is_none());

        args.card_id = Some("CB79000000010142".into());
        assert_eq!(
            args.card_id().unwrap().map(|id| id.to_string()),
            Some("CB79000000010142".to_string())
        );

        args.card_id = Some("not hex".into());
        assert!(args.card_id().is_err());
    }
}
