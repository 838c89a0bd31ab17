pub mod adapter;
pub mod channel;
pub mod error;
pub mod message;

pub use adapter::BroadcastAdapter;
pub use channel::{ChannelBroadcast, ChannelNetwork};
pub use error::BroadcastError;
pub use message::{Message, MessageKind};
