//! Connection state enums for both sides of the tunnel.
//!
//! These mirror spec §4.1/§4.2 verbatim; the state is threaded through
//! the (async, sequential) connection-handling tasks in `duskwire-client`
//! and `duskwire-exit` purely for logging/observability and for the
//! assertions that guard against an impossible transition, the same
//! role the `state_t` tag plays in the original callback-dispatched C
//! state machine.

/// Client-side ("local side") connection state — spec §4.1.
///
/// ```text
/// CLOSED     -> NEGO_RCVD   (valid SOCKS5 greeting)
/// CLOSED     -> NEGO_ERR    (malformed or no acceptable method)
/// NEGO_RCVD  -> NEGO_SENT   (greeting reply sent)
/// NEGO_ERR   -> CLOSE_WAIT  (rejection reply sent; 1s delay then close)
/// NEGO_SENT  -> CMD_RCVD    (CONNECT parsed, remote socket connecting)
/// NEGO_SENT  -> CMD_ERR     (unsupported command or address type)
/// CMD_ERR    -> CLOSE_WAIT  (SOCKS5 error reply sent)
/// CMD_RCVD   -> CONNECTED   (remote socket writable, SO_ERROR == 0)
/// CMD_RCVD   -> REQ_ERR     (connect failed)
/// CONNECTED  -> REQ_SENT    (512-byte handshake written in full)
/// REQ_SENT   -> REP_RCVD    (4-byte reply decrypts to MAGIC)
/// REQ_SENT   -> REQ_ERR     (reply mismatch)
/// REP_RCVD   -> ESTAB       (SOCKS5 success reply sent)
/// REQ_ERR    -> CLOSE_WAIT  (SOCKS5 "general failure"/"refused" reply sent)
/// ESTAB      -> (terminal, torn down by cleanup)
/// CLOSE_WAIT -> (terminal, torn down when the 1s timer fires)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Closed,
    NegoRcvd,
    NegoErr,
    NegoSent,
    CmdRcvd,
    CmdErr,
    Connected,
    ReqSent,
    RepRcvd,
    ReqErr,
    Estab,
    CloseWait,
}

/// Server-side ("remote"/"exit" side) connection state — spec §4.2.
///
/// ```text
/// CLOSED    -> (parked)    (512 bytes received, decrypted, MAGIC matches;
///                           DNS resolution scheduled asynchronously)
/// CLOSED    -> (dropped)   (wrong length or bad MAGIC: immediate close)
/// (parked)  -> REQ_RCVD    (resolution ok, socket created, connect() issued)
/// (parked)  -> REQ_ERR     (resolution failed; 4-byte zero reply queued)
/// REQ_RCVD  -> CONNECTED   (connect succeeded; MAGIC reply queued)
/// REQ_RCVD  -> REQ_RCVD    (connect failed, next address in list tried)
/// REQ_RCVD  -> REQ_ERR     (address list exhausted)
/// CONNECTED -> ESTAB       (reply delivered to tunnel client)
/// REQ_ERR   -> CLOSE_WAIT  (reply sent; 1s grace)
/// ESTAB     -> (terminal, torn down by cleanup)
/// CLOSE_WAIT -> (terminal, torn down when the 1s timer fires)
/// ```
///
/// There is no explicit tag between `Closed` and `ReqRcvd`: the
/// connection is "parked" awaiting the resolver's completion, exactly
/// as the original has no intermediate `state_t` value for that wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Closed,
    ReqRcvd,
    ReqErr,
    Connected,
    Estab,
    CloseWait,
}
