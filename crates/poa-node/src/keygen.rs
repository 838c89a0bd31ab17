//! `poa-keygen` — generates a fresh validator keypair and prints its
//! address and hex-encoded secret key. The secret key is never logged
//! through `tracing`; it is written once to stdout for the operator to
//! redirect into a key file.

use poa_crypto::KeyPair;

fn main() {
    let kp = KeyPair::generate();
    println!("address:    {}", kp.address);
    println!("secret_key: 0x{}", hex::encode(kp.secret_bytes()));
}
