//! Duskwire local proxy
//!
//! Accepts SOCKS5 clients on a loopback port, picks a configured
//! tunnel server at random per connection, and forwards the session
//! through the encrypted tunnel (spec §4.1).

mod connection;
mod error;
mod server_pool;

pub use connection::handle_client;
pub use duskwire_core::state::ClientState;
pub use error::ClientError;
pub use server_pool::ServerPool;
