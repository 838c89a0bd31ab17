use poa_core::types::{Address, Hash256};

/// `H(bytes)` — the protocol hash function, SHA-256 (§3 "Crypto
/// primitives"). Every other hash in the system (tx hash, block hash,
/// merkle root, state digest) is this function applied to some canonical
/// byte string.
pub fn hash(data: &[u8]) -> Hash256 {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash256::from_bytes(out)
}

/// `addressOf(pubKey) → 20B` — hash-last-20 convention over the
/// uncompressed secp256k1 public key (§3 "Address").
pub fn address_of(pubkey: &secp256k1::PublicKey) -> Address {
    let uncompressed = pubkey.serialize_uncompressed();
    // Drop the leading 0x04 tag; hash the raw (x, y) coordinate bytes.
    let digest = hash(&uncompressed[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&digest.as_bytes()[12..]);
    Address::from_bytes(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash(b"abc"), hash(b"abc"));
        assert_ne!(hash(b"abc"), hash(b"abd"));
    }

    #[test]
    fn address_derivation_is_deterministic() {
        let secp = secp256k1::Secp256k1::new();
        let (_, pk) = secp.generate_keypair(&mut rand::thread_rng());
        assert_eq!(address_of(&pk), address_of(&pk));
    }
}
