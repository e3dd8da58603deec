//! Configuration types shared between the config-file parser
//! (`duskwire-settings`) and both binaries (spec §6 "Configuration
//! file").

use serde::{Deserialize, Serialize};

fn default_server_address() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    1205
}

fn default_local_address() -> String {
    "127.0.0.1".to_string()
}

fn default_local_port() -> u16 {
    1080
}

/// One configured upstream tunnel server (client side) or one listener
/// identity (exit side) — spec §3 "Server identity record".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerIdentity {
    #[serde(default = "default_server_address")]
    pub address: String,

    #[serde(default = "default_server_port")]
    pub port: u16,

    pub key: String,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            address: default_server_address(),
            port: default_server_port(),
            key: String::new(),
        }
    }
}

impl ServerIdentity {
    /// Shared secret truncated to the wire-protocol cap.
    pub fn key_bytes(&self) -> &[u8] {
        crate::wire::truncate_key(self.key.as_bytes())
    }
}

/// Local SOCKS5 listener binding (spec §6, "local {address, port}").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalBinding {
    #[serde(default = "default_local_address")]
    pub address: String,

    #[serde(default = "default_local_port")]
    pub port: u16,
}

impl Default for LocalBinding {
    fn default() -> Self {
        Self {
            address: default_local_address(),
            port: default_local_port(),
        }
    }
}

/// Top-level config-file shape: `server_num` upstream/identity entries
/// plus the local binding (spec §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: Vec<ServerIdentity>,

    #[serde(default)]
    pub local: LocalBinding,
}
