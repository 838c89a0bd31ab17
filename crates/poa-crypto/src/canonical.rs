use serde::Serialize;

use crate::error::CryptoError;

/// `canonical(tx|header) → bytes` (§3 "Crypto primitives"): JSON with keys
/// in lexicographic order over the value's explicit, closed field list.
///
/// `serde_json::Value`'s `Map` is `BTreeMap`-backed unless the
/// `preserve_order` feature is enabled (it is not, here), so ordinary
/// `serde_json::to_vec` on a round-tripped `Value` already sorts object
/// keys lexicographically — there is no hand-rolled encoder to keep in
/// sync with `serde`'s derive output.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CryptoError> {
    let as_value = serde_json::to_value(value).map_err(|e| CryptoError::Canonical(e.to_string()))?;
    serde_json::to_vec(&as_value).map_err(|e| CryptoError::Canonical(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Unordered {
        zeta: u32,
        alpha: u32,
        mu: u32,
    }

    #[test]
    fn keys_are_sorted_lexicographically() {
        let v = Unordered { zeta: 1, alpha: 2, mu: 3 };
        let bytes = canonical_bytes(&v).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        let alpha_pos = s.find("alpha").unwrap();
        let mu_pos = s.find("mu").unwrap();
        let zeta_pos = s.find("zeta").unwrap();
        assert!(alpha_pos < mu_pos && mu_pos < zeta_pos);
    }

    #[test]
    fn canonical_bytes_are_deterministic() {
        let v = Unordered { zeta: 1, alpha: 2, mu: 3 };
        assert_eq!(canonical_bytes(&v).unwrap(), canonical_bytes(&v).unwrap());
    }
}
