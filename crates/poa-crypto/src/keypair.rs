use poa_core::types::Address;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::hash::address_of;
use crate::sign;

/// A PoA keypair: secp256k1 secret + public keys with the derived address.
///
/// The secret key is held in a `Zeroizing<[u8; 32]>` so it is wiped on
/// drop.
pub struct KeyPair {
    pub address: Address,
    pub public_key: PublicKey,
    secret_key: Zeroizing<[u8; 32]>,
}

impl KeyPair {
    /// Generate a fresh secp256k1 keypair.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (sk, pk) = secp.generate_keypair(&mut rand::thread_rng());
        let address = address_of(&pk);
        Self {
            address,
            public_key: pk,
            secret_key: Zeroizing::new(sk.secret_bytes()),
        }
    }

    /// Restore a `KeyPair` from a raw 32-byte secret key.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&bytes).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let pk = PublicKey::from_secret_key(&secp, &sk);
        let address = address_of(&pk);
        Ok(Self {
            address,
            public_key: pk,
            secret_key: Zeroizing::new(bytes),
        })
    }

    /// Sign `message`, hashing it with `H` first (§3 "Crypto primitives").
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        sign::sign(message, &self.secret_key).expect("sign with a valid secret key is infallible")
    }

    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret_key
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ address: {:?} }}", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypair_signs_and_recovers() {
        let kp = KeyPair::generate();
        let msg = b"transaction payload";
        let sig = kp.sign(msg);
        sign::verify_bound(msg, &sig, &kp.address).unwrap();
    }

    #[test]
    fn from_secret_bytes_round_trips_address() {
        let kp = KeyPair::generate();
        let restored = KeyPair::from_secret_bytes(*kp.secret_bytes()).unwrap();
        assert_eq!(kp.address, restored.address);
    }
}
