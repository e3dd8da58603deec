//! Per-connection handling for one accepted tunnel client — spec §4.2.
//!
//! As on the client side (see `duskwire-client`), the callback-driven
//! state machine collapses into one sequential async task per
//! connection (spec §9); `ServerState` is threaded through purely for
//! observability.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use duskwire_core::state::ServerState;
use duskwire_core::wire;
use duskwire_core::{DuskwireError, Result};

use crate::resolve::resolve_and_connect;

/// Grace period the tunnel socket is kept open after an error reply
/// (spec §4.2 CLOSE_WAIT, §4.7).
const CLOSE_WAIT_DELAY: Duration = Duration::from_secs(1);

/// Mandatory send/receive timeout on every connection socket (spec
/// §4.6, §5, §6: "nonblocking ... `SO_SNDTIMEO = SO_RCVTIMEO = 10 s`").
const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `fut` under [`IO_TIMEOUT`], mapping expiry to
/// [`DuskwireError::Timeout`] the same way any other socket error is
/// surfaced.
async fn io_timeout<T>(fut: impl std::future::Future<Output = std::io::Result<T>>) -> Result<T> {
    match tokio::time::timeout(IO_TIMEOUT, fut).await {
        Ok(result) => result.map_err(DuskwireError::from),
        Err(_) => Err(DuskwireError::Timeout),
    }
}

/// Handle one accepted tunnel connection end-to-end: read and decrypt
/// the handshake, resolve and connect to the upstream target, and
/// forward bytes until either side closes.
pub async fn handle_tunnel(mut local: TcpStream, secret: &[u8]) -> Result<()> {
    let mut handshake = [0u8; wire::HANDSHAKE_LEN];
    // Wrong length or early EOF: immediate close, no reply (spec §7).
    io_timeout(local.read_exact(&mut handshake)).await?;

    let (ciphertext, iv) = handshake.split_at(wire::PLAINTEXT_LEN);
    let mut cipher = duskwire_crypto::tunnel_cipher(iv, secret);

    let mut plaintext = [0u8; wire::PLAINTEXT_LEN];
    plaintext.copy_from_slice(ciphertext);
    cipher.apply_keystream(&mut plaintext);

    let (magic, host, port) = wire::parse_request_plaintext(&plaintext)?;
    if magic != wire::MAGIC {
        // Bad MAGIC: immediate close, no reply (spec §4.2, §7).
        debug!("tunnel handshake MAGIC mismatch, dropping connection");
        return Err(DuskwireError::MagicMismatch);
    }

    let mut state = ServerState::Closed;
    debug!(?state, host = %host, port, "handshake decrypted, resolving");

    let remote = match resolve_and_connect(&host, port).await {
        Ok(remote) => remote,
        Err(err) => {
            state = ServerState::ReqErr;
            warn!(?state, host = %host, port, "upstream resolve/connect failed: {err}");
            let mut reply = wire::build_reply(false);
            cipher.apply_keystream(&mut reply);
            io_timeout(local.write_all(&reply)).await.ok();
            close_wait(local, state).await;
            return Err(err);
        }
    };
    state = ServerState::ReqRcvd;
    debug!(?state, host = %host, port, "upstream connected");

    state = ServerState::Connected;
    let mut reply = wire::build_reply(true);
    cipher.apply_keystream(&mut reply);
    io_timeout(local.write_all(&reply)).await?;
    state = ServerState::Estab;
    info!(?state, host = %host, port, "tunnel established");

    forward(local, remote, cipher).await;
    Ok(())
}

/// Flush the error reply, hold the tunnel socket open for one more
/// second, then drop it (spec §4.7).
async fn close_wait(local: TcpStream, state: ServerState) {
    debug!(?state, "entering CLOSE_WAIT");
    tokio::time::sleep(CLOSE_WAIT_DELAY).await;
    drop(local);
}

/// Bidirectional forwarding loop for ESTAB (spec §4.6 direction table,
/// server side: decrypt local→remote, encrypt remote→local). Each
/// direction is driven by its own task so that a destination backed up
/// on one side can never stop the other side's read from being polled
/// — the RC4 state is the only thing shared, behind a plain `Mutex`
/// that is never held across an `.await`.
async fn forward(local: TcpStream, remote: TcpStream, cipher: duskwire_crypto::Rc4Cipher) {
    let cipher = Arc::new(Mutex::new(cipher));
    let (mut local_rd, mut local_wr) = local.into_split();
    let (mut remote_rd, mut remote_wr) = remote.into_split();

    let to_remote_cipher = cipher.clone();
    let mut to_remote = tokio::spawn(async move {
        let mut buf = vec![0u8; wire::BUF_SIZE];
        loop {
            let n = match io_timeout(local_rd.read(&mut buf)).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            to_remote_cipher.lock().unwrap().apply_keystream(&mut buf[..n]);
            if io_timeout(remote_wr.write_all(&buf[..n])).await.is_err() {
                break;
            }
        }
    });

    let mut to_local = tokio::spawn(async move {
        let mut buf = vec![0u8; wire::BUF_SIZE];
        loop {
            let n = match io_timeout(remote_rd.read(&mut buf)).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            cipher.lock().unwrap().apply_keystream(&mut buf[..n]);
            if io_timeout(local_wr.write_all(&buf[..n])).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut to_remote => to_local.abort(),
        _ = &mut to_local => to_remote.abort(),
    }
    let _ = to_remote.await;
    let _ = to_local.await;
    debug!("tunnel forwarding ended");
}
