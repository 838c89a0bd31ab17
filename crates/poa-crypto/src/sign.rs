use poa_core::types::Address;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::hash::{address_of, hash};

/// `sign(message, privKey) → sig` (§3 "Crypto primitives").
///
/// `message` is hashed with `H` before signing; the returned signature is
/// the 65-byte recoverable form `r || s || recoveryId`, low-S normalized by
/// `secp256k1`'s `sign_ecdsa_recoverable`.
pub fn sign(message: &[u8], secret_key: &Zeroizing<[u8; 32]>) -> Result<Vec<u8>, CryptoError> {
    let secp = Secp256k1::signing_only();
    let sk = SecretKey::from_slice(&secret_key[..]).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let digest = hash(message);
    let msg = Message::from_digest(*digest.as_bytes());
    let (recovery_id, sig_bytes) = secp
        .sign_ecdsa_recoverable(&msg, &sk)
        .serialize_compact();
    let mut out = Vec::with_capacity(65);
    out.extend_from_slice(&sig_bytes);
    out.push(recovery_id.to_i32() as u8);
    Ok(out)
}

/// `verify(message, sig, pubKey) → {ok, recoveredAddress?}`.
///
/// Returns the recovered address on success; the caller is responsible for
/// checking it against the claimed sender/validator (§3 "Contract").
pub fn verify(message: &[u8], signature: &[u8]) -> Result<Address, CryptoError> {
    if signature.len() != 65 {
        return Err(CryptoError::InvalidSignatureLength(signature.len()));
    }
    let secp = Secp256k1::verification_only();
    let recovery_id = RecoveryId::from_i32(signature[64] as i32)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    let digest = hash(message);
    let msg = Message::from_digest(*digest.as_bytes());
    let pubkey: PublicKey = secp
        .recover_ecdsa(&msg, &recoverable)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    Ok(address_of(&pubkey))
}

/// Verifies `signature` over `message` and checks the recovered address
/// equals `expected` — the binding check mandated by §3's "Contract".
pub fn verify_bound(message: &[u8], signature: &[u8], expected: &Address) -> Result<(), CryptoError> {
    let recovered = verify(message, signature)?;
    if &recovered != expected {
        return Err(CryptoError::AddressMismatch {
            expected: *expected,
            recovered,
        });
    }
    Ok(())
}
