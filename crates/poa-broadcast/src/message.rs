use serde::{Deserialize, Serialize};

/// The six message kinds exchanged between nodes (§6 "Broadcast adapter
/// API"). The payload format per kind is owned by the caller
/// (`poa-consensus`/`poa-fault`); this crate only moves bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Block,
    Vote,
    Heartbeat,
    Accusation,
    SyncRequest,
    SyncResponse,
}

/// One message on the wire: a kind tag plus an opaque, bincode-encoded
/// application payload — the same shape as the teacher's gossip envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(kind: MessageKind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// Serialize to bytes for transport.
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("Message serialization is infallible")
    }

    /// Deserialize from transport bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let msg = Message::new(MessageKind::Vote, vec![1, 2, 3]);
        let bytes = msg.to_bytes();
        let decoded = Message::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.kind, MessageKind::Vote);
        assert_eq!(decoded.payload, vec![1, 2, 3]);
    }
}
