//! Commands for the issuer data areas

use std::{error::Error, fs, path::PathBuf};

use bytes::Bytes;
use tapcard::{CardId, CardManager};
use tapcard_transport_pcsc::PcscTransport;
use tracing::info;

use crate::utils::{display, parse_hex};

fn counter_text(counter: Option<u32>) -> String {
    counter.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Read and verify the issuer data
pub async fn read_issuer_data_command(
    manager: &CardManager<PcscTransport>,
    card_id: Option<&CardId>,
) -> Result<(), Box<dyn Error>> {
    let response = manager.read_issuer_data(card_id).await?;

    println!(
        "{}",
        display::key_value_box(
            "Issuer data",
            vec![
                ("Card ID", response.card_id.to_string()),
                ("Data", hex::encode(&response.issuer_data)),
                ("Signature", hex::encode(&response.issuer_data_signature)),
                ("Counter", counter_text(response.issuer_data_counter)),
            ],
        )
    );
    println!("{}", display::success("Issuer signature verified"));

    Ok(())
}

/// Replace the issuer data
pub async fn write_issuer_data_command(
    manager: &CardManager<PcscTransport>,
    card_id: Option<&CardId>,
    data: &str,
    signature: &str,
    counter: Option<u32>,
) -> Result<(), Box<dyn Error>> {
    let data = parse_hex("data", data)?;
    let signature = parse_hex("signature", signature)?;

    info!("Writing {} byte(s) of issuer data", data.len());
    let response = manager
        .write_issuer_data(card_id, data, signature, counter)
        .await?;
    println!(
        "{}",
        display::success(&format!("Issuer data written to card {}", response.card_id))
    );

    Ok(())
}

/// Read and verify the issuer extra data
pub async fn read_issuer_extra_data_command(
    manager: &CardManager<PcscTransport>,
    card_id: Option<&CardId>,
    output: Option<&PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let extra = manager.read_issuer_extra_data(card_id).await?;

    let data = match output {
        Some(path) => {
            fs::write(path, &extra.data)?;
            format!("{} byte(s) written to {}", extra.data.len(), path.display())
        }
        None => hex::encode(&extra.data),
    };

    println!(
        "{}",
        display::key_value_box(
            "Issuer extra data",
            vec![
                ("Card ID", extra.card_id.to_string()),
                ("Data", data),
                ("Signature", hex::encode(&extra.signature)),
                ("Counter", counter_text(extra.counter)),
            ],
        )
    );
    println!("{}", display::success("Issuer signature verified"));

    Ok(())
}

/// Write the issuer extra data from a file
pub async fn write_issuer_extra_data_command(
    manager: &CardManager<PcscTransport>,
    card_id: Option<&CardId>,
    input: &PathBuf,
    starting_signature: &str,
    finalizing_signature: &str,
    counter: Option<u32>,
) -> Result<(), Box<dyn Error>> {
    let data = Bytes::from(fs::read(input)?);
    let starting_signature = parse_hex("starting signature", starting_signature)?;
    let finalizing_signature = parse_hex("finalizing signature", finalizing_signature)?;

    info!(
        "Writing {} byte(s) of issuer extra data from {}",
        data.len(),
        input.display()
    );
    let response = manager
        .write_issuer_extra_data(
            card_id,
            data,
            starting_signature,
            finalizing_signature,
            counter,
        )
        .await?;
    println!(
        "{}",
        display::success(&format!(
            "Issuer extra data written to card {}",
            response.card_id
        ))
    );

    Ok(())
}
