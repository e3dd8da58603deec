//! Configured tunnel servers and per-connection random selection
//! (spec §4.5 "client-side selection is simpler").

use duskwire_core::{DuskwireError, Result, ServerIdentity};
use rand::Rng;

/// The set of configured upstream tunnel servers, resolved once at
/// startup (spec §4.5: "the list of configured tunnel servers is
/// resolved once at startup (synchronously)").
#[derive(Debug, Clone)]
pub struct ServerPool {
    servers: Vec<ServerIdentity>,
}

impl ServerPool {
    pub fn new(servers: Vec<ServerIdentity>) -> Self {
        Self { servers }
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Choose one configured server uniformly at random, one draw per
    /// new SOCKS5 connection (spec §4.5, §6 "Randomness").
    pub fn choose(&self) -> Result<&ServerIdentity> {
        if self.servers.is_empty() {
            return Err(DuskwireError::NoServersConfigured);
        }
        let idx = rand::thread_rng().gen_range(0..self.servers.len());
        Ok(&self.servers[idx])
    }
}
