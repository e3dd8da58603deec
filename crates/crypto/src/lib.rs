//! Duskwire tunnel cipher
//!
//! Per-connection key derivation and the RC4 keystream used to encrypt
//! the handshake and, afterwards, every forwarded byte (spec §4.3).
//!
//! RC4 is not a modern cipher and this module must not be "improved" —
//! interoperability with the wire protocol depends on reproducing the
//! original's keying and single-shared-state behavior exactly.

mod cipher;
mod keying;

pub use cipher::Rc4Cipher;
pub use keying::derive_key;

/// Derive the key and initialize the RC4 state in one step — the
/// single cipher instance a `Connection` keeps for the lifetime of the
/// tunnel, shared by both forwarding directions (spec §4.3).
pub fn tunnel_cipher(iv: &[u8], secret: &[u8]) -> Rc4Cipher {
    Rc4Cipher::new(&derive_key(iv, secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_and_server_derive_the_same_cipher() {
        let iv = [3u8; 236];
        let secret = b"shared-secret-bytes";

        let mut client = tunnel_cipher(&iv, secret);
        let mut server = tunnel_cipher(&iv, secret);

        let mut plaintext = b"hello from the client".to_vec();
        let original = plaintext.clone();
        client.apply_keystream(&mut plaintext);
        server.apply_keystream(&mut plaintext);
        assert_eq!(plaintext, original);
    }
}
