//! Commands using or changing the wallet key

use std::error::Error;

use tapcard::{CardId, CardManager, WalletVerification};
use tapcard_transport_pcsc::PcscTransport;
use tracing::info;

use crate::utils::{display, parse_hex};

/// Sign a batch of hashes
pub async fn sign_command(
    manager: &CardManager<PcscTransport>,
    card_id: Option<&CardId>,
    hashes: &[String],
) -> Result<(), Box<dyn Error>> {
    let hashes = hashes
        .iter()
        .map(|hash| parse_hex("hash", hash))
        .collect::<Result<Vec<_>, _>>()?;

    info!("Signing {} hash(es)", hashes.len());
    let response = manager.sign(card_id, hashes).await?;
    // The countdown line has no newline of its own
    eprintln!();

    let mut items: Vec<(&str, String)> = vec![("Card ID", response.card_id.to_string())];
    items.extend(
        response
            .signatures
            .iter()
            .map(|signature| ("Signature", hex::encode(signature))),
    );
    items.push(("Remaining signatures", response.remaining_signatures.to_string()));
    if let Some(signed) = response.signed_hashes {
        items.push(("Signed hashes", signed.to_string()));
    }
    println!("{}", display::key_value_box("Signatures", items));

    Ok(())
}

/// Create the wallet key on an empty card
pub async fn create_wallet_command(
    manager: &CardManager<PcscTransport>,
    card_id: Option<&CardId>,
) -> Result<(), Box<dyn Error>> {
    info!("Creating wallet");
    let (response, verification) = manager.create_wallet(card_id).await?;

    println!("{}", display::success("Wallet created"));
    println!(
        "{}",
        display::key_value_box(
            "Wallet",
            vec![
                ("Card ID", response.card_id.to_string()),
                ("Status", response.status.to_string()),
                ("Public key", hex::encode(&response.wallet_public_key)),
            ],
        )
    );
    if verification == WalletVerification::Skipped {
        println!(
            "{}",
            display::warning("Firmware does not support wallet verification")
        );
    }

    Ok(())
}

/// Destroy the wallet key
pub async fn purge_wallet_command(
    manager: &CardManager<PcscTransport>,
    card_id: Option<&CardId>,
) -> Result<(), Box<dyn Error>> {
    info!("Purging wallet");
    let response = manager.purge_wallet(card_id).await?;

    println!("{}", display::success("Wallet purged"));
    println!("Card {} is now {}", response.card_id, response.status);

    Ok(())
}
