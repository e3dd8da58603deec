//! End-to-end scenarios for the local/exit tunnel pair (spec §8 S1-S5).
//!
//! Each test drives a raw `TcpStream` as the SOCKS5 client against a
//! `duskwire-local` connection handler wired up to either a real
//! `duskwire-exit` handler or a deliberately misbehaving stand-in,
//! asserting on the exact reply bytes spec §8 calls out.
//!
//! S6 (multi-address DNS fallback) is exercised directly against
//! `duskwire-exit`'s address-list walk in its own unit tests, since
//! reproducing a real multi-address DNS answer here would require
//! network access this suite doesn't have.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use duskwire_client::{handle_client, ServerPool};
use duskwire_core::ServerIdentity;
use duskwire_exit::handle_tunnel;

const SHARED_KEY: &[u8] = b"integration-test-shared-secret";

/// Spawn a `duskwire-exit` listener using the shared test key, return
/// its bound address.
async fn spawn_exit() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            tokio::spawn(async move {
                let _ = handle_tunnel(stream, SHARED_KEY).await;
            });
        }
    });
    addr
}

/// Spawn a `duskwire-local` listener whose single upstream is `exit_addr`.
async fn spawn_local(exit_addr: SocketAddr) -> SocketAddr {
    let pool = ServerPool::new(vec![ServerIdentity {
        address: exit_addr.ip().to_string(),
        port: exit_addr.port(),
        key: String::from_utf8(SHARED_KEY.to_vec()).unwrap(),
    }]);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            let pool = pool.clone();
            tokio::spawn(async move {
                let _ = handle_client(stream, pool).await;
            });
        }
    });
    addr
}

/// Spawn a plain TCP echo server, return its bound address.
async fn spawn_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });
    addr
}

fn connect_request_ipv4(addr: SocketAddr) -> Vec<u8> {
    let mut req = vec![0x05, 0x01, 0x00, 0x01];
    match addr.ip() {
        std::net::IpAddr::V4(v4) => req.extend_from_slice(&v4.octets()),
        _ => panic!("expected IPv4 address"),
    }
    req.extend_from_slice(&addr.port().to_be_bytes());
    req
}

/// S1 — happy path, IPv4 literal: greeting accepted, CONNECT accepted,
/// bytes echo both ways through the tunnel.
#[tokio::test]
async fn s1_happy_path_ipv4_echoes_data() {
    let echo_addr = spawn_echo().await;
    let exit_addr = spawn_exit().await;
    let local_addr = spawn_local(exit_addr).await;

    let mut browser = TcpStream::connect(local_addr).await.unwrap();
    browser.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut greeting_reply = [0u8; 2];
    browser.read_exact(&mut greeting_reply).await.unwrap();
    assert_eq!(greeting_reply, [0x05, 0x00]);

    browser
        .write_all(&connect_request_ipv4(echo_addr))
        .await
        .unwrap();
    let mut connect_reply = [0u8; 10];
    browser.read_exact(&mut connect_reply).await.unwrap();
    assert_eq!(&connect_reply[..4], &[0x05, 0x00, 0x00, 0x01]);

    browser.write_all(b"hello tunnel").await.unwrap();
    let mut echoed = [0u8; 12];
    browser.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"hello tunnel");
}

/// S2 — unsupported command (BIND instead of CONNECT).
#[tokio::test]
async fn s2_unsupported_command_gets_command_not_supported() {
    let exit_addr = spawn_exit().await;
    let local_addr = spawn_local(exit_addr).await;

    let mut browser = TcpStream::connect(local_addr).await.unwrap();
    browser.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut greeting_reply = [0u8; 2];
    browser.read_exact(&mut greeting_reply).await.unwrap();
    assert_eq!(greeting_reply, [0x05, 0x00]);

    // CMD = 0x02 (BIND), ATYP = IPv4, arbitrary address/port.
    let bad_request = [0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1, 0, 80];
    browser.write_all(&bad_request).await.unwrap();

    let mut connect_reply = [0u8; 10];
    browser.read_exact(&mut connect_reply).await.unwrap();
    assert_eq!(connect_reply, [0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);

    let mut trailing = [0u8; 1];
    let result = tokio::time::timeout(Duration::from_secs(2), browser.read(&mut trailing)).await;
    assert_eq!(result.unwrap().unwrap(), 0, "socket should close after CLOSE_WAIT");
}

/// S3 — unsupported address type.
#[tokio::test]
async fn s3_unsupported_address_type_gets_address_type_not_supported() {
    let exit_addr = spawn_exit().await;
    let local_addr = spawn_local(exit_addr).await;

    let mut browser = TcpStream::connect(local_addr).await.unwrap();
    browser.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut greeting_reply = [0u8; 2];
    browser.read_exact(&mut greeting_reply).await.unwrap();
    assert_eq!(greeting_reply, [0x05, 0x00]);

    // ATYP = 0x05, not a valid SOCKS5 address type.
    let bad_request = [0x05, 0x01, 0x00, 0x05, 0, 0, 0, 0];
    browser.write_all(&bad_request).await.unwrap();

    let mut connect_reply = [0u8; 10];
    browser.read_exact(&mut connect_reply).await.unwrap();
    assert_eq!(connect_reply, [0x05, 0x08, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
}

/// S4 — bad MAGIC from server: a stand-in "exit" accepts the
/// handshake but replies with garbage instead of the encrypted MAGIC.
#[tokio::test]
async fn s4_bad_server_magic_gets_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let exit_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut handshake = [0u8; duskwire_core::wire::HANDSHAKE_LEN];
            let _ = stream.read_exact(&mut handshake).await;
            // Any 4 bytes that don't decrypt to MAGIC under the
            // client's cipher will do; an all-zero ciphertext works
            // regardless of the derived key.
            let _ = stream.write_all(&[0u8; 4]).await;
        }
    });
    let local_addr = spawn_local(exit_addr).await;

    let mut browser = TcpStream::connect(local_addr).await.unwrap();
    browser.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut greeting_reply = [0u8; 2];
    browser.read_exact(&mut greeting_reply).await.unwrap();
    assert_eq!(greeting_reply, [0x05, 0x00]);

    browser
        .write_all(&connect_request_ipv4("127.0.0.1:9".parse().unwrap()))
        .await
        .unwrap();
    let mut connect_reply = [0u8; 10];
    browser.read_exact(&mut connect_reply).await.unwrap();
    assert_eq!(connect_reply[..2], [0x05, 0x05]);
}

/// S5 — DNS failure on the exit side: the client sees a non-MAGIC
/// reply (the exit's encrypted all-zero failure frame) the same as S4.
#[tokio::test]
async fn s5_dns_failure_gets_connection_refused() {
    let exit_addr = spawn_exit().await;
    let local_addr = spawn_local(exit_addr).await;

    let mut browser = TcpStream::connect(local_addr).await.unwrap();
    browser.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut greeting_reply = [0u8; 2];
    browser.read_exact(&mut greeting_reply).await.unwrap();
    assert_eq!(greeting_reply, [0x05, 0x00]);

    let domain = b"no.such.host.invalid";
    let mut request = vec![0x05, 0x01, 0x00, 0x03, domain.len() as u8];
    request.extend_from_slice(domain);
    request.extend_from_slice(&80u16.to_be_bytes());
    browser.write_all(&request).await.unwrap();

    let mut connect_reply = [0u8; 10];
    browser.read_exact(&mut connect_reply).await.unwrap();
    assert_eq!(connect_reply[..2], [0x05, 0x05]);
}
