pub mod error;
pub mod pool;

pub use error::MempoolError;
pub use pool::{Mempool, PooledTransaction, SelectStrategy};
