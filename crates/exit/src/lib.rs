//! Duskwire exit proxy
//!
//! Accepts tunnel connections on one listener per configured server
//! identity, decrypts and parses the handshake, resolves the
//! requested host with ordered multi-address fallback, and forwards
//! traffic to the upstream target (spec §4.2, §4.5).

mod connection;
mod error;
mod resolve;

pub use connection::handle_tunnel;
pub use duskwire_core::state::ServerState;
pub use error::ExitError;
