//! Commands reading the card

use std::error::Error;

use tapcard::{CardManager, WalletVerification};
use tapcard_transport_pcsc::PcscTransport;
use tracing::info;

use crate::utils::display;

/// Read the card and verify its wallet key
pub async fn scan_command(manager: &CardManager<PcscTransport>) -> Result<(), Box<dyn Error>> {
    info!("Scanning card");
    let outcome = manager.scan().await?;

    println!("{}", display::section_title("Card"));
    print!("{}", outcome.card);

    match outcome.wallet {
        WalletVerification::Verified => println!("{}", display::success("Wallet key verified")),
        WalletVerification::Skipped => println!(
            "{}",
            display::warning("Firmware does not support wallet verification")
        ),
        WalletVerification::NotApplicable => println!("No wallet on this card"),
    }

    Ok(())
}
