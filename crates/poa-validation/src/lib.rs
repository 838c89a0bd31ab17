pub mod block;
pub mod error;
pub mod transaction;
pub mod view;

pub use block::{validate_block_header, validate_genesis_header};
pub use error::ValidationError;
pub use transaction::{validate_transaction, validate_transaction_structural};
pub use view::AccountStateView;
