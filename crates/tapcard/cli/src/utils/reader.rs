use tapcard_transport_pcsc::{PcscDeviceManager, PcscError};

use super::display;

/// List all available readers
pub fn list_readers(manager: &PcscDeviceManager) -> Result<(), Box<dyn std::error::Error>> {
    let readers = match manager.list_readers() {
        Ok(readers) => readers,
        Err(PcscError::NoReadersAvailable) => {
            println!("{}", display::warning("No readers found!"));
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", display::section_title("Available readers"));
    for (i, reader) in readers.iter().enumerate() {
        let status = if reader.has_card() {
            "card present"
        } else {
            "no card"
        };
        println!("{}. {} ({})", i + 1, reader.name(), status);
    }

    Ok(())
}
