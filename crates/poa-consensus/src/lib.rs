pub mod error;
pub mod events;
pub mod round;

pub use error::ConsensusError;
pub use events::ConsensusEvent;
pub use round::ConsensusEngine;
