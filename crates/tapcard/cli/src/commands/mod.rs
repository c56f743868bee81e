//! Command handlers, one per subcommand

mod card_operations;
mod issuer_data;
mod wallet_operations;

pub use card_operations::*;
pub use issuer_data::*;
pub use wallet_operations::*;
