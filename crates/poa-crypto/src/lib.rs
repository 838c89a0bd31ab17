pub mod canonical;
pub mod error;
pub mod hash;
pub mod keypair;
pub mod merkle;
pub mod sign;

pub use canonical::canonical_bytes;
pub use error::CryptoError;
pub use hash::{address_of, hash};
pub use keypair::KeyPair;
pub use merkle::{merkle_proof, merkle_root, verify_merkle_proof, MerkleStep};
pub use sign::{sign as sign_message, verify, verify_bound};
