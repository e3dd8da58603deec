//! Per-connection handling for one accepted SOCKS5 client — spec §4.1.
//!
//! The original dispatches on a state tag from inside I/O callbacks;
//! here the same state table (`duskwire_core::state::ClientState`) is
//! collapsed into a single sequential async task per connection (spec
//! §9, "callback-chained state machine → explicit state + task
//! model"). The state is still logged at every transition so the
//! table stays visible in traces.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::RngCore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use duskwire_core::socks5::{self, ConnectTarget};
use duskwire_core::state::ClientState;
use duskwire_core::wire;
use duskwire_core::{DuskwireError, Result};
use duskwire_crypto::tunnel_cipher;

use crate::server_pool::ServerPool;

/// Grace period the local socket is kept open after an error reply
/// (spec §4.1 CLOSE_WAIT, §4.7).
const CLOSE_WAIT_DELAY: Duration = Duration::from_secs(1);

/// Mandatory send/receive timeout on every connection socket (spec
/// §4.6, §5, §6: "nonblocking ... `SO_SNDTIMEO = SO_RCVTIMEO = 10 s`").
const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `fut` under [`IO_TIMEOUT`], mapping expiry to
/// [`DuskwireError::Timeout`] the same way any other socket error is
/// surfaced (spec §4.7: a timed-out socket is a connection error, not
/// a special case).
async fn io_timeout<T>(fut: impl std::future::Future<Output = std::io::Result<T>>) -> Result<T> {
    match tokio::time::timeout(IO_TIMEOUT, fut).await {
        Ok(result) => result.map_err(DuskwireError::from),
        Err(_) => Err(DuskwireError::Timeout),
    }
}

/// Handle one accepted SOCKS5 client end-to-end: negotiate, connect to
/// a randomly chosen tunnel server, complete the tunnel handshake, and
/// forward bytes until either side closes.
pub async fn handle_client(mut local: TcpStream, servers: ServerPool) -> Result<()> {
    let mut state = ClientState::Closed;

    let methods = match read_greeting(&mut local).await {
        Ok(methods) => methods,
        Err(err) => {
            state = ClientState::NegoErr;
            debug!(?state, "failed to read SOCKS5 greeting: {err}");
            io_timeout(local.write_all(&socks5::greeting_reply(false)))
                .await
                .ok();
            close_wait(local, state).await;
            return Err(err);
        }
    };

    if socks5::check_greeting(socks5::VERSION, &methods).is_err() {
        state = ClientState::NegoErr;
        debug!(?state, "no acceptable SOCKS5 auth method");
        io_timeout(local.write_all(&socks5::greeting_reply(false)))
            .await
            .ok();
        close_wait(local, state).await;
        return Err(DuskwireError::NoAcceptableMethod);
    }

    state = ClientState::NegoRcvd;
    debug!(?state, "SOCKS5 greeting accepted, replying");
    io_timeout(local.write_all(&socks5::greeting_reply(true))).await?;
    state = ClientState::NegoSent;
    debug!(?state, "SOCKS5 greeting accepted");

    let target = match read_connect_request(&mut local).await {
        Ok(target) => target,
        Err(err) => {
            state = ClientState::CmdErr;
            let rep = match &err {
                DuskwireError::UnsupportedCommand(_) => socks5::REP_COMMAND_NOT_SUPPORTED,
                DuskwireError::UnsupportedAddressType(_) => {
                    socks5::REP_ADDRESS_TYPE_NOT_SUPPORTED
                }
                _ => socks5::REP_GENERAL_FAILURE,
            };
            warn!(?state, "bad CONNECT request: {err}");
            io_timeout(local.write_all(&socks5::connect_reply(rep)))
                .await
                .ok();
            close_wait(local, state).await;
            return Err(err);
        }
    };
    state = ClientState::CmdRcvd;
    debug!(?state, host = %target.host, port = target.port, "CONNECT parsed");

    let server = match servers.choose() {
        Ok(server) => server,
        Err(err) => {
            state = ClientState::ReqErr;
            warn!(?state, "no tunnel servers configured");
            io_timeout(local.write_all(&socks5::connect_reply(socks5::REP_GENERAL_FAILURE)))
                .await
                .ok();
            close_wait(local, state).await;
            return Err(err);
        }
    };

    let mut remote = match TcpStream::connect((server.address.as_str(), server.port)).await {
        Ok(remote) => remote,
        Err(err) => {
            // Original's `connect_cb` else branch (`SO_ERROR != 0`)
            // maps straight to `0x05`, the same code used for a bad
            // tunnel-handshake reply.
            state = ClientState::ReqErr;
            warn!(?state, "failed to connect to tunnel server: {err}");
            io_timeout(local.write_all(&socks5::connect_reply(socks5::REP_CONNECTION_REFUSED)))
                .await
                .ok();
            close_wait(local, state).await;
            return Err(err.into());
        }
    };
    state = ClientState::Connected;
    debug!(?state, server = %server.address, "connected to tunnel server");

    let mut iv = [0u8; wire::IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let mut cipher = tunnel_cipher(&iv, server.key_bytes());

    let plaintext = match wire::build_request_plaintext(&target.host, target.port) {
        Ok(plaintext) => plaintext,
        Err(err) => {
            state = ClientState::ReqErr;
            warn!(?state, "host does not fit in handshake frame: {err}");
            io_timeout(local.write_all(&socks5::connect_reply(socks5::REP_GENERAL_FAILURE)))
                .await
                .ok();
            close_wait(local, state).await;
            return Err(err);
        }
    };

    let mut handshake = [0u8; wire::HANDSHAKE_LEN];
    handshake[..wire::PLAINTEXT_LEN].copy_from_slice(&plaintext);
    cipher.apply_keystream(&mut handshake[..wire::PLAINTEXT_LEN]);
    handshake[wire::PLAINTEXT_LEN..].copy_from_slice(&iv);

    if let Err(err) = io_timeout(remote.write_all(&handshake)).await {
        // Original's `remote_write_cb` CONNECTED case fails silently:
        // `cleanup()` with no SOCKS5 reply at all, both sockets just
        // close.
        state = ClientState::ReqErr;
        warn!(?state, "failed to write tunnel handshake: {err}");
        drop(local);
        drop(remote);
        return Err(err);
    }
    state = ClientState::ReqSent;
    debug!(?state, "tunnel handshake sent");

    let mut reply = [0u8; wire::REPLY_LEN];
    match io_timeout(remote.read_exact(&mut reply)).await {
        Ok(_) => {
            cipher.apply_keystream(&mut reply);
            if !wire::reply_is_ok(&reply) {
                // Open Question #3 (spec §9): preserve the original's
                // 0x05 ("connection refused") mapping for a reply that
                // arrived but decrypts to the wrong MAGIC.
                state = ClientState::ReqErr;
                warn!(?state, "tunnel server rejected handshake (bad MAGIC)");
                io_timeout(local.write_all(&socks5::connect_reply(socks5::REP_CONNECTION_REFUSED)))
                    .await
                    .ok();
                close_wait(local, state).await;
                return Err(DuskwireError::MagicMismatch);
            }
        }
        Err(err) => {
            // Original's `remote_read_cb` REQ_SENT case: anything
            // other than exactly 4 bytes (short read, EOF, reset,
            // timeout) goes straight to `cleanup()`, no reply.
            state = ClientState::ReqErr;
            warn!(?state, "failed to read tunnel handshake reply: {err}");
            drop(local);
            drop(remote);
            return Err(err);
        }
    }
    state = ClientState::RepRcvd;
    debug!(?state, "tunnel handshake accepted");

    io_timeout(local.write_all(&socks5::connect_reply(socks5::REP_SUCCESS))).await?;
    state = ClientState::Estab;
    info!(?state, host = %target.host, port = target.port, "tunnel established");

    forward(local, remote, cipher).await;
    Ok(())
}

async fn read_greeting(local: &mut TcpStream) -> Result<Vec<u8>> {
    let mut header = [0u8; 2];
    io_timeout(local.read_exact(&mut header)).await?;
    let nmethods = header[1] as usize;
    let mut methods = vec![0u8; nmethods];
    io_timeout(local.read_exact(&mut methods)).await?;
    if header[0] != socks5::VERSION {
        return Err(DuskwireError::BadSocksVersion(header[0]));
    }
    Ok(methods)
}

async fn read_connect_request(local: &mut TcpStream) -> Result<ConnectTarget> {
    let mut header = [0u8; 4];
    io_timeout(local.read_exact(&mut header)).await?;

    if header[0] != socks5::VERSION {
        return Err(DuskwireError::BadSocksVersion(header[0]));
    }
    if header[1] != socks5::CMD_CONNECT {
        return Err(DuskwireError::UnsupportedCommand(header[1]));
    }

    let host = match header[3] {
        socks5::ATYP_V4 => {
            let mut addr = [0u8; 4];
            io_timeout(local.read_exact(&mut addr)).await?;
            socks5::format_v4(&addr)
        }
        socks5::ATYP_DOMAIN => {
            let mut len_buf = [0u8; 1];
            io_timeout(local.read_exact(&mut len_buf)).await?;
            let mut domain = vec![0u8; len_buf[0] as usize];
            io_timeout(local.read_exact(&mut domain)).await?;
            String::from_utf8(domain)
                .map_err(|_| DuskwireError::UnsupportedAddressType(header[3]))?
        }
        socks5::ATYP_V6 => {
            let mut addr = [0u8; 16];
            io_timeout(local.read_exact(&mut addr)).await?;
            socks5::format_v6(&addr)
        }
        other => return Err(DuskwireError::UnsupportedAddressType(other)),
    };

    let mut port_buf = [0u8; 2];
    io_timeout(local.read_exact(&mut port_buf)).await?;
    let port = u16::from_be_bytes(port_buf);

    Ok(ConnectTarget { host, port })
}

/// Flush the error reply, hold the local socket open for one more
/// second so the SOCKS5 client can read it, then drop it (spec §4.7).
async fn close_wait(local: TcpStream, state: ClientState) {
    debug!(?state, "entering CLOSE_WAIT");
    tokio::time::sleep(CLOSE_WAIT_DELAY).await;
    drop(local);
}

/// Bidirectional forwarding loop for ESTAB (spec §4.6). Each direction
/// is driven by its own task so that a destination backed up on one
/// side can never stop the other side's read from being polled — the
/// RC4 state is the only thing shared, behind a plain `Mutex` that is
/// never held across an `.await` (spec §4.6: "both directions make
/// independent progress").
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
