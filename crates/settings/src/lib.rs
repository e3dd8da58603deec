//! Duskwire Settings
//!
//! Configuration-file parsing and CLI-override merging for both
//! binaries (spec §6 "Configuration file").
//!
//! ## Usage
//!
//! ```no_run
//! use duskwire_settings::{load_config, CliOverrides};
//!
//! let mut config = load_config(Some("duskwire.json"))?;
//! config = duskwire_settings::merge_cli_overrides(
//!     config,
//!     CliOverrides { server_address: None, server_port: None, server_key: None,
//!                    local_address: None, local_port: None },
//! );
//! # Ok::<(), duskwire_settings::SettingsError>(())
//! ```

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use duskwire_core::{AppConfig, ServerIdentity};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Load a JSON config file, or the default empty config if `path` is
/// `None`. Defaults for each field are filled in by `AppConfig`'s
/// `serde(default = ...)` attributes (spec §6).
pub fn load_config(path: Option<impl AsRef<Path>>) -> Result<AppConfig> {
    match path {
        Some(path) => {
            let path = path.as_ref();
            debug!("loading config from {}", path.display());
            let text = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(AppConfig::default()),
    }
}

/// CLI flags that shortcut the config file for a single upstream
/// (`-s`, `-p`, `-k`) and the local binding (`-b`, `-l`) — spec §6.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub server_address: Option<String>,
    pub server_port: Option<u16>,
    pub server_key: Option<String>,
    pub local_address: Option<String>,
    pub local_port: Option<u16>,
}

/// Apply CLI overrides on top of a loaded config.
///
/// Any of `-s`/`-p`/`-k` present replaces the *entire* server list with
/// a single entry (`server_num = 1` in the original), merging with
/// whatever the config file already set for the fields not overridden.
/// `-b`/`-l` replace the local binding's address/port independently.
pub fn merge_cli_overrides(mut config: AppConfig, overrides: CliOverrides) -> AppConfig {
    let wants_single_server = overrides.server_address.is_some()
        || overrides.server_port.is_some()
        || overrides.server_key.is_some();

    if wants_single_server {
        let mut identity = config.server.into_iter().next().unwrap_or_default();
        if let Some(address) = overrides.server_address {
            identity.address = address;
        }
        if let Some(port) = overrides.server_port {
            identity.port = port;
        }
        if let Some(key) = overrides.server_key {
            identity.key = key;
        }
        config.server = vec![identity];
    }

    if let Some(address) = overrides.local_address {
        config.local.address = address;
    }
    if let Some(port) = overrides.local_port {
        config.local.port = port;
    }

    config
}

/// Ensure every configured server identity has a non-empty key;
/// `None` entries are a fatal configuration error (spec §2 main(),
/// which exits via `help()` if `server[i].key == NULL`).
pub fn validate_servers(servers: &[ServerIdentity]) -> Result<()> {
    for server in servers {
        if server.key.is_empty() {
            return Err(SettingsError::Validation(format!(
                "server {}:{} is missing a key",
                server.address, server.port
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_path_gives_defaults() {
        let config = load_config(None::<&str>).unwrap();
        assert!(config.server.is_empty());
        assert_eq!(config.local.address, "127.0.0.1");
        assert_eq!(config.local.port, 1080);
    }

    #[test]
    fn single_server_shortcut_replaces_list() {
        let mut config = AppConfig::default();
        config.server.push(ServerIdentity {
            address: "old.example".into(),
            port: 1,
            key: "old-key".into(),
        });
        config.server.push(ServerIdentity {
            address: "old2.example".into(),
            port: 2,
            key: "old-key-2".into(),
        });

        let merged = merge_cli_overrides(
            config,
            CliOverrides {
                server_address: Some("1.2.3.4".into()),
                server_port: Some(9999),
                server_key: Some("new-key".into()),
                local_address: None,
                local_port: None,
            },
        );

        assert_eq!(merged.server.len(), 1);
        assert_eq!(merged.server[0].address, "1.2.3.4");
        assert_eq!(merged.server[0].port, 9999);
        assert_eq!(merged.server[0].key, "new-key");
    }

    #[test]
    fn local_overrides_apply_independently() {
        let config = AppConfig::default();
        let merged = merge_cli_overrides(
            config,
            CliOverrides {
                server_address: None,
                server_port: None,
                server_key: None,
                local_address: Some("0.0.0.0".into()),
                local_port: Some(2000),
            },
        );
        assert_eq!(merged.local.address, "0.0.0.0");
        assert_eq!(merged.local.port, 2000);
        assert!(merged.server.is_empty());
    }

    #[test]
    fn validate_servers_rejects_missing_key() {
        let servers = vec![ServerIdentity {
            address: "1.2.3.4".into(),
            port: 1205,
            key: String::new(),
        }];
        assert!(validate_servers(&servers).is_err());
    }
}
