//! Asynchronous name resolution and ordered multi-address connect
//! fallback (spec §4.5).
//!
//! The original issues `getaddrinfo_a` and is notified via a signal
//! carrying the `Connection` pointer; here `tokio::net::lookup_host`
//! plays the resolver's role directly as an awaitable future, and the
//! "retained until exhausted or a connect succeeds" address-list walk
//! is a plain loop instead of a second round of callbacks.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, warn};

use duskwire_core::{DuskwireError, Result};

/// Per-address connect timeout (spec §4.5, §6: "10 s send/receive timeouts").
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolve `host:port` and connect to the first address that accepts,
/// trying the rest of the list in order on failure (spec §4.5).
pub async fn resolve_and_connect(host: &str, port: u16) -> Result<TcpStream> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|err| DuskwireError::ResolutionFailed(format!("{host}: {err}")))?
        .collect();

    if addrs.is_empty() {
        return Err(DuskwireError::ResolutionFailed(format!(
            "{host}: no addresses returned"
        )));
    }

    connect_any(&addrs).await
}

/// Walk `addrs` in order, returning the first successful connection
/// (spec §4.5: "for each address in the returned linked list in
/// order ... if nonzero, close this socket, advance to the next
/// address, repeat").
async fn connect_any(addrs: &[SocketAddr]) -> Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        debug!(%addr, "attempting upstream connect");
        match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(err)) => {
                warn!(%addr, "upstream connect failed: {err}");
                last_err = Some(err.to_string());
            }
            Err(_) => {
                warn!(%addr, "upstream connect timed out");
                last_err = Some("connect timed out".to_string());
            }
        }
    }

    Err(DuskwireError::ConnectFailed(
        last_err.unwrap_or_else(|| "address list exhausted".to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_refused_surfaces_as_connect_failed() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // nothing listening now: connection refused

        let result = resolve_and_connect(&addr.ip().to_string(), addr.port()).await;
        assert!(matches!(result, Err(DuskwireError::ConnectFailed(_))));
    }

    /// Spec S6: first address refuses, second accepts — the fallback
    /// must land on the second without giving up after the first.
    #[tokio::test]
    async fn falls_back_to_the_second_address() {
        let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead_addr = dead.local_addr().unwrap();
        drop(dead);

        let live = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live_addr = live.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = live.accept().await {
                let _ = stream.write_all(b"ok").await;
            }
        });

        let stream = connect_any(&[dead_addr, live_addr]).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), live_addr);
    }
}
