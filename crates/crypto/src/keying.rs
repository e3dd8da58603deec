//! Per-connection key derivation (spec §4.3 step 2-4):
//!
//! ```text
//! k0 = MD5(IV || K)
//! k1 = MD5(k0)
//! k2 = MD5(k0 || k1)
//! k3 = MD5(k0 || k1 || k2)
//! key = k0 || k1 || k2 || k3   (64 bytes, the RC4 key)
//! ```
//!
//! `IV` is the 236-byte plaintext tail of the handshake; `K` is the
//! shared secret, already truncated to 256 bytes by the caller.

use md5::{Digest, Md5};

/// Derive the 64-byte RC4 key from `(iv, secret)`. Pure: the same
/// inputs always produce the same output on both endpoints (spec §8,
/// property 4).
pub fn derive_key(iv: &[u8], secret: &[u8]) -> [u8; 64] {
    let mut k0_input = Vec::with_capacity(iv.len() + secret.len());
    k0_input.extend_from_slice(iv);
    k0_input.extend_from_slice(secret);
    let k0 = Md5::digest(&k0_input);

    let k1 = Md5::digest(k0);

    let mut k2_input = Vec::with_capacity(32);
    k2_input.extend_from_slice(&k0);
    k2_input.extend_from_slice(&k1);
    let k2 = Md5::digest(&k2_input);

    let mut k3_input = Vec::with_capacity(48);
    k3_input.extend_from_slice(&k0);
    k3_input.extend_from_slice(&k1);
    k3_input.extend_from_slice(&k2);
    let k3 = Md5::digest(&k3_input);

    let mut key = [0u8; 64];
    key[0..16].copy_from_slice(&k0);
    key[16..32].copy_from_slice(&k1);
    key[32..48].copy_from_slice(&k2);
    key[48..64].copy_from_slice(&k3);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_pure() {
        let iv = [7u8; 236];
        let secret = b"shared-secret";
        assert_eq!(derive_key(&iv, secret), derive_key(&iv, secret));
    }

    #[test]
    fn different_iv_gives_different_key() {
        let secret = b"shared-secret";
        let iv_a = [1u8; 236];
        let iv_b = [2u8; 236];
        assert_ne!(derive_key(&iv_a, secret), derive_key(&iv_b, secret));
    }
}
