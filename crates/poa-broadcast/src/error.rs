use poa_core::types::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("sync request to {peer} timed out")]
    SyncTimeout { peer: Address },

    #[error("unknown peer: {0}")]
    UnknownPeer(Address),
}
