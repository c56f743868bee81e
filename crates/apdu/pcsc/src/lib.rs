//! PC/SC transport for contactless wallet cards
//!
//! This crate implements the async `CardTransport` trait from
//! `tapcard-apdu-core` on top of the PC/SC API, so the `tapcard` engine can
//! drive a desktop contactless reader.
//!
//! PC/SC calls block; every call that talks to the reader runs on the tokio
//! blocking pool.
//!
//! # Examples
//!
//! ```no_run
//! # async fn run() -> Result<(), tapcard_transport_pcsc::PcscError> {
//! use tapcard_transport_pcsc::{ConnectStrategy, PcscConfig, PcscDeviceManager};
//!
//! let manager = PcscDeviceManager::new()?;
//! for reader in manager.list_readers()? {
//!     println!("{} (card: {})", reader.name(), reader.has_card());
//! }
//!
//! let transport = manager.connect_strategy(ConnectStrategy::AnyCard, PcscConfig::default())?;
//! println!("Using {}", transport.reader_name());
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod config;
mod error;
mod manager;
mod reader;
mod transport;

pub use config::{ConnectStrategy, PcscConfig, ShareMode};
pub use error::PcscError;
pub use manager::PcscDeviceManager;
pub use reader::PcscReader;
pub use transport::PcscTransport;

// Re-export some pcsc types for convenience
pub use pcsc::{Protocols, Scope};
