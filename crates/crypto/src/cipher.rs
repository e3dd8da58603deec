//! RC4 keystream cipher.
//!
//! A single [`Rc4Cipher`] instance is shared by both directions of a
//! connection (spec §4.3): the same state XORs outbound plaintext and
//! inbound ciphertext alike, synchronous-stream-cipher style. That is
//! a known weakness of the wire protocol, not a design to "fix" —
//! reproducing it exactly is required for interoperability.

/// RC4 keystream generator. `apply_keystream` both encrypts and
/// decrypts: RC4 is a symmetric XOR stream, so the same method name
/// and the same state serve either direction.
pub struct Rc4Cipher {
    state: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4Cipher {
    /// Initialize from a key of 1 to 256 bytes (spec uses a 64-byte key).
    pub fn new(key: &[u8]) -> Self {
        assert!(!key.is_empty() && key.len() <= 256, "RC4 key must be 1..=256 bytes");

        let mut state = [0u8; 256];
        for (idx, slot) in state.iter_mut().enumerate() {
            *slot = idx as u8;
        }

        let mut j: u8 = 0;
        for i in 0..256usize {
            j = j
                .wrapping_add(state[i])
                .wrapping_add(key[i % key.len()]);
            state.swap(i, j as usize);
        }

        Self { state, i: 0, j: 0 }
    }

    /// XOR `data` in place with the next `data.len()` keystream bytes,
    /// advancing the shared state. Calling this on the outbound buffer
    /// encrypts it; calling it again on the matching inbound buffer
    /// (with a cipher in the same state) decrypts it.
    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.state[self.i as usize]);
            self.state.swap(self.i as usize, self.j as usize);
            let k = self.state[(self.state[self.i as usize].wrapping_add(self.state[self.j as usize])) as usize];
            *byte ^= k;
        }
    }
}
