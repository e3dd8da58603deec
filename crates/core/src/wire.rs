//! Tunnel handshake framing (spec §4.3).
//!
//! ```text
//! offset 0..3     MAGIC = 0x526f6e61 (big-endian)
//! offset 4..260   HOST  (NUL-terminated ASCII, up to 257 bytes)
//! offset 261..275 PORT  (NUL-terminated ASCII decimal, up to 15 bytes)
//! offset 276..511 IV    (236 random bytes, sent in clear)
//! ```
//! The first 276 bytes are encrypted; the IV tail is not.

use crate::error::{DuskwireError, Result};

/// Stream cipher buffer size shared by both sides (spec §3).
pub const BUF_SIZE: usize = 8192;

/// 32-bit sentinel identifying a well-formed handshake/reply.
pub const MAGIC: u32 = 0x526f_6e61;

/// Max length of the NUL-terminated HOST field, including the NUL.
pub const HOST_LEN: usize = 257;

/// Max length of the NUL-terminated PORT field, including the NUL.
pub const PORT_LEN: usize = 15;

/// Length of the plaintext IV tail.
pub const IV_LEN: usize = 236;

/// Length of the encrypted prefix (MAGIC + HOST + PORT).
pub const PLAINTEXT_LEN: usize = 4 + HOST_LEN + PORT_LEN;

/// Total length of the client-to-server handshake frame.
pub const HANDSHAKE_LEN: usize = PLAINTEXT_LEN + IV_LEN;

/// Length of the server-to-client reply frame.
pub const REPLY_LEN: usize = 4;

/// Maximum number of configured upstream tunnel servers.
pub const MAX_SERVER: usize = 32;

/// Maximum shared-secret length after truncation (spec §3, §9).
pub const MAX_KEY_LEN: usize = 256;

const _: () = assert!(HANDSHAKE_LEN == 512);

/// Build the 276-byte plaintext prefix (MAGIC, HOST, PORT) that gets
/// encrypted before being written out with the IV tail appended.
///
/// `host` must fit, NUL included, in [`HOST_LEN`] bytes; `port` is
/// rendered as decimal ASCII and must fit, NUL included, in
/// [`PORT_LEN`] bytes (any `u16` does — max 5 digits + NUL = 6).
pub fn build_request_plaintext(host: &str, port: u16) -> Result<[u8; PLAINTEXT_LEN]> {
    if host.len() + 1 > HOST_LEN {
        return Err(DuskwireError::HostTooLong(host.len()));
    }
    let mut buf = [0u8; PLAINTEXT_LEN];
    buf[0..4].copy_from_slice(&MAGIC.to_be_bytes());
    buf[4..4 + host.len()].copy_from_slice(host.as_bytes());
    let port_str = port.to_string();
    buf[4 + HOST_LEN..4 + HOST_LEN + port_str.len()].copy_from_slice(port_str.as_bytes());
    Ok(buf)
}

/// Parse the decrypted 276-byte prefix back into `(magic, host, port)`.
///
/// Does not itself reject a bad magic; callers compare against
/// [`MAGIC`] so that "wrong magic" and "garbage that isn't even a
/// number" are both just "not equal".
pub fn parse_request_plaintext(buf: &[u8; PLAINTEXT_LEN]) -> Result<(u32, String, u16)> {
    let magic = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    let host_bytes = &buf[4..4 + HOST_LEN];
    let host_end = host_bytes.iter().position(|&b| b == 0).unwrap_or(HOST_LEN);
    let host = String::from_utf8_lossy(&host_bytes[..host_end]).into_owned();

    let port_bytes = &buf[4 + HOST_LEN..4 + HOST_LEN + PORT_LEN];
    let port_end = port_bytes.iter().position(|&b| b == 0).unwrap_or(PORT_LEN);
    let port_str = String::from_utf8_lossy(&port_bytes[..port_end]);
    let port: u16 = port_str
        .parse()
        .map_err(|_| DuskwireError::Config(format!("bad port field: {port_str:?}")))?;

    Ok((magic, host, port))
}

/// Build the 4-byte reply frame: `MAGIC` on success, all-zero on failure.
pub fn build_reply(ok: bool) -> [u8; REPLY_LEN] {
    if ok {
        MAGIC.to_be_bytes()
    } else {
        [0u8; REPLY_LEN]
    }
}

/// Decode a reply frame; `true` iff it decrypts to exactly `MAGIC`.
pub fn reply_is_ok(buf: &[u8; REPLY_LEN]) -> bool {
    u32::from_be_bytes(*buf) == MAGIC
}

/// Truncate a shared secret to [`MAX_KEY_LEN`] bytes, matching the
/// original C implementation's `key[257] = '\0'; key_len = 256;`
/// behavior bit-for-bit (spec §9, Open Question #1): interoperate with
/// existing deployments rather than reject overlong keys.
pub fn truncate_key(key: &[u8]) -> &[u8] {
    if key.len() > MAX_KEY_LEN {
        &key[..MAX_KEY_LEN]
    } else {
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_roundtrip() {
        let buf = build_request_plaintext("example.com", 443).unwrap();
        let (magic, host, port) = parse_request_plaintext(&buf).unwrap();
        assert_eq!(magic, MAGIC);
        assert_eq!(host, "example.com");
        assert_eq!(port, 443);
    }

    #[test]
    fn plaintext_rejects_overlong_host() {
        let host = "a".repeat(HOST_LEN);
        assert!(build_request_plaintext(&host, 80).is_err());
    }

    #[test]
    fn reply_roundtrip() {
        assert!(reply_is_ok(&build_reply(true)));
        assert!(!reply_is_ok(&build_reply(false)));
    }

    #[test]
    fn key_truncation_matches_original_cap() {
        let key = vec![0x41u8; 300];
        assert_eq!(truncate_key(&key).len(), MAX_KEY_LEN);
        let short = vec![0x41u8; 10];
        assert_eq!(truncate_key(&short).len(), 10);
    }

    #[test]
    fn handshake_len_is_512_bytes() {
        assert_eq!(HANDSHAKE_LEN, 512);
        assert_eq!(REPLY_LEN, 4);
    }
}
