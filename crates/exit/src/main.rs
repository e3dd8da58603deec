//! `duskwire-exit` — the tunnel-terminating remote proxy (spec §2, §6).

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use duskwire_core::ServerIdentity;
use duskwire_exit::handle_tunnel;
use duskwire_settings::{load_config, merge_cli_overrides, validate_servers, CliOverrides};

/// Tunnel-terminating exit proxy for the duskwire tunnel.
#[derive(Parser, Debug)]
#[command(name = "duskwire-exit", disable_version_flag = true)]
struct Cli {
    /// Configuration file (JSON).
    #[arg(short = 'c', long = "config")]
    config: Option<String>,

    /// Single-upstream shortcut: listener address.
    #[arg(short = 's', long = "server")]
    server: Option<String>,

    /// Single-upstream shortcut: listener port.
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Single-upstream shortcut: shared secret key.
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Accepted but unused on the exit side (spec §6: "accepted by
    /// server binary too").
    #[arg(short = 'b', long = "bind")]
    bind: Option<String>,

    /// Accepted but unused on the exit side.
    #[arg(short = 'l', long = "local-port")]
    local_port: Option<u16>,
}

const EXIT_ARGUMENT_ERROR: u8 = 1;
const EXIT_SOCKET_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if err.kind() == clap::error::ErrorKind::DisplayHelp
                || err.kind() == clap::error::ErrorKind::DisplayVersion
            {
                print!("{err}");
                return ExitCode::SUCCESS;
            }
            eprintln!("{err}");
            return ExitCode::from(EXIT_ARGUMENT_ERROR);
        }
    };

    duskwire_logging::init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config: {err}");
            return ExitCode::from(EXIT_ARGUMENT_ERROR);
        }
    };

    let config = merge_cli_overrides(
        config,
        CliOverrides {
            server_address: cli.server,
            server_port: cli.port,
            server_key: cli.key,
            local_address: cli.bind,
            local_port: cli.local_port,
        },
    );

    if let Err(err) = validate_servers(&config.server) {
        eprintln!("invalid configuration: {err}");
        return ExitCode::from(EXIT_ARGUMENT_ERROR);
    }

    if config.server.is_empty() {
        eprintln!("no server identities configured");
        return ExitCode::from(EXIT_ARGUMENT_ERROR);
    }

    let mut listeners = Vec::with_capacity(config.server.len());
    for identity in config.server {
        let bind_addr = (identity.address.as_str(), identity.port);
        match TcpListener::bind(bind_addr).await {
            Ok(listener) => {
                info!("duskwire-exit listening on {}:{}", identity.address, identity.port);
                listeners.push((listener, identity));
            }
            Err(err) => {
                error!(
                    "failed to bind listener on {}:{}: {err}",
                    identity.address, identity.port
                );
                return ExitCode::from(EXIT_SOCKET_ERROR);
            }
        }
    }

    let mut tasks = Vec::with_capacity(listeners.len());
    for (listener, identity) in listeners {
        tasks.push(tokio::spawn(run_listener(listener, identity)));
    }

    for task in tasks {
        let _ = task.await;
    }

    ExitCode::SUCCESS
}

async fn run_listener(listener: TcpListener, identity: ServerIdentity) {
    let identity = Arc::new(identity);
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                error!("accept failed: {err}");
                continue;
            }
        };
        let identity = identity.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_tunnel(stream, identity.key_bytes()).await {
                info!("tunnel connection from {peer} ended: {err}");
            }
        });
    }
}
