pub mod account;
pub mod block;
pub mod config;
pub mod consensus;
pub mod constants;
pub mod encoding;
pub mod error;
pub mod transaction;
pub mod types;
pub mod validator;

pub use account::*;
pub use block::*;
pub use config::*;
pub use consensus::*;
pub use constants::*;
pub use error::CoreError;
pub use transaction::*;
pub use types::*;
pub use validator::*;
