use async_trait::async_trait;
use poa_core::block::Block;
use poa_core::types::Address;

use crate::error::BroadcastError;
use crate::message::MessageKind;

/// The transport boundary (§6 "Broadcast adapter API"): consumed by
/// `poa-consensus`/`poa-fault`, provided by an out-of-scope network layer.
/// `poa-broadcast` ships one in-process implementation
/// ([`crate::channel::ChannelBroadcast`]) for tests and single-process demos;
/// a real deployment provides its own (e.g. gossip over libp2p, as the
/// teacher's own P2P crate does for its DAG).
#[async_trait]
pub trait BroadcastAdapter: Send + Sync {
    /// `broadcast(kind, payload)`.
    async fn broadcast(&self, kind: MessageKind, payload: Vec<u8>) -> Result<(), BroadcastError>;

    /// `requestSync(peer, fromBlock, toBlock) -> stream<Block>`. Returns the
    /// full batch rather than a true stream — recovery sync runs in bounded
    /// ranges (`§4.6`), so buffering the whole response is acceptable.
    async fn request_sync(&self, peer: Address, from_block: u64, to_block: u64) -> Result<Vec<Block>, BroadcastError>;
}
