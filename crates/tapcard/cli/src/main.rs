use std::{path::PathBuf, sync::Arc};

use clap::{ArgAction, Parser, Subcommand};
use tapcard::{CardManager, SessionConfig};
use tapcard_apdu_core::EncryptionMode;
use tapcard_transport_pcsc::{ConnectStrategy, PcscConfig, PcscDeviceManager};
use tracing::info;

mod commands;
mod utils;

use commands::*;
use utils::{CardArgs, FileRepository, TerminalDelegate, reader};

#[derive(Parser)]
#[command(version, about = "Tapcard CLI for contactless wallet cards")]
struct Cli {
    /// Optional reader name to use (will auto-detect if not specified)
    #[arg(short, long, global = true)]
    reader: Option<String>,

    /// More output; repeat for trace level
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    card: CardArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available readers
    ListReaders,

    /// Read the card and verify its wallet key
    Scan,

    /// Sign up to ten equal-length hashes
    Sign {
        /// Hashes to sign, as hex strings
        #[arg(required = true, num_args = 1..=10)]
        hashes: Vec<String>,
    },

    /// Create the wallet key on an empty card
    CreateWallet,

    /// Destroy the wallet key
    PurgeWallet,

    /// Read and verify the issuer data
    ReadIssuerData,

    /// Replace the issuer data
    WriteIssuerData {
        /// Issuer data in hex
        #[arg(long, required = true)]
        data: String,

        /// Issuer signature in hex
        #[arg(long, required = true)]
        signature: String,

        /// Replay counter
        #[arg(long)]
        counter: Option<u32>,
    },

    /// Read and verify the issuer extra data
    ReadIssuerExtraData {
        /// Write the data to this file instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the issuer extra data from a file
    WriteIssuerExtraData {
        /// File holding the extra data
        #[arg(short, long, required = true)]
        input: PathBuf,

        /// Starting signature in hex
        #[arg(long, required = true)]
        starting_signature: String,

        /// Finalizing signature in hex
        #[arg(long, required = true)]
        finalizing_signature: String,

        /// Replay counter
        #[arg(long)]
        counter: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let devices = PcscDeviceManager::new()?;
    if let Commands::ListReaders = cli.command {
        return reader::list_readers(&devices);
    }

    let strategy = cli
        .reader
        .clone()
        .map_or(ConnectStrategy::AnyCard, ConnectStrategy::Reader);
    let config = PcscConfig::default().with_raw_frames(cli.card.raw_frames);
    let transport = devices.connect_strategy(strategy, config)?;
    info!("Using reader: {}", transport.reader_name());

    let repository = FileRepository::open(cli.card.state_file.clone(), cli.card.environment())?;
    let preferred = if cli.card.encrypt {
        EncryptionMode::Strong
    } else {
        EncryptionMode::None
    };
    let manager = Arc::new(
        CardManager::new(transport, Arc::new(repository))
            .with_config(SessionConfig::new().with_preferred_encryption(preferred))
            .with_delegate(Arc::new(TerminalDelegate)),
    );

    let canceller = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                manager.cancel();
            }
        })
    };

    let card_id = cli.card.card_id()?;
    let card_id = card_id.as_ref();
    let result = match cli.command {
        Commands::ListReaders => Ok(()),
        Commands::Scan => scan_command(&manager).await,
        Commands::Sign { hashes } => sign_command(&manager, card_id, &hashes).await,
        Commands::CreateWallet => create_wallet_command(&manager, card_id).await,
        Commands::PurgeWallet => purge_wallet_command(&manager, card_id).await,
        Commands::ReadIssuerData => read_issuer_data_command(&manager, card_id).await,
        Commands::WriteIssuerData {
            data,
            signature,
            counter,
        } => write_issuer_data_command(&manager, card_id, &data, &signature, counter).await,
        Commands::ReadIssuerExtraData { output } => {
            read_issuer_extra_data_command(&manager, card_id, output.as_ref()).await
        }
        Commands::WriteIssuerExtraData {
            input,
            starting_signature,
            finalizing_signature,
            counter,
        } => {
            write_issuer_extra_data_command(
                &manager,
                card_id,
                &input,
                &starting_signature,
                &finalizing_signature,
                counter,
            )
            .await
        }
    };

    canceller.abort();
    result
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_ansi(true)
        .init();
}
