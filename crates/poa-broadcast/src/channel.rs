use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use poa_core::block::Block;
use poa_core::types::Address;
use tokio::sync::{mpsc, Mutex};

use crate::adapter::BroadcastAdapter;
use crate::error::BroadcastError;
use crate::message::{Message, MessageKind};

type SyncProvider = Arc<dyn Fn(u64, u64) -> Vec<Block> + Send + Sync>;

/// An in-process hub connecting every node's [`ChannelBroadcast`] handle.
/// Stands in for the out-of-scope network transport in tests and
/// single-process demos — the same role the teacher's `P2pNetwork` plays
/// for its DAG, minus the libp2p swarm.
#[derive(Clone, Default)]
pub struct ChannelNetwork {
    inboxes: Arc<Mutex<HashMap<Address, mpsc::UnboundedSender<(Address, Message)>>>>,
    sync_providers: Arc<Mutex<HashMap<Address, SyncProvider>>>,
}

impl ChannelNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the network as `addr`, serving sync requests from
    /// `sync_provider` (typically `move |from, to| ledger.export_range(from, to).unwrap_or_default()`).
    pub async fn join<F>(&self, addr: Address, sync_provider: F) -> ChannelBroadcast
    where
        F: Fn(u64, u64) -> Vec<Block> + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes.lock().await.insert(addr, tx);
        self.sync_providers.lock().await.insert(addr, Arc::new(sync_provider));
        ChannelBroadcast {
            self_addr: addr,
            inboxes: self.inboxes.clone(),
            sync_providers: self.sync_providers.clone(),
            inbound: Mutex::new(rx),
        }
    }
}

/// One node's handle onto a [`ChannelNetwork`].
pub struct ChannelBroadcast {
    self_addr: Address,
    inboxes: Arc<Mutex<HashMap<Address, mpsc::UnboundedSender<(Address, Message)>>>>,
    sync_providers: Arc<Mutex<HashMap<Address, SyncProvider>>>,
    inbound: Mutex<mpsc::UnboundedReceiver<(Address, Message)>>,
}

impl ChannelBroadcast {
    /// Drain every message queued since the last poll — the pull-based
    /// equivalent of the spec's `onMessage(kind, from, payload)` callback.
    pub async fn poll_inbound(&self) -> Vec<(Address, Message)> {
        let mut rx = self.inbound.lock().await;
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }
}

#[async_trait]
impl BroadcastAdapter for ChannelBroadcast {
    async fn broadcast(&self, kind: MessageKind, payload: Vec<u8>) -> Result<(), BroadcastError> {
        let msg = Message::new(kind, payload);
        let inboxes = self.inboxes.lock().await;
        for (addr, tx) in inboxes.iter() {
            if *addr == self.self_addr {
                continue;
            }
            let _ = tx.send((self.self_addr, msg.clone()));
        }
        Ok(())
    }

    async fn request_sync(&self, peer: Address, from_block: u64, to_block: u64) -> Result<Vec<Block>, BroadcastError> {
        let providers = self.sync_providers.lock().await;
        let provider = providers.get(&peer).ok_or(BroadcastError::UnknownPeer(peer))?;
        Ok(provider(from_block, to_block))
    }
}
