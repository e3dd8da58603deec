//! `duskwire-local` — the SOCKS5-speaking local proxy (spec §2, §6).

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use duskwire_client::{handle_client, ServerPool};
use duskwire_core::ServerIdentity;
use duskwire_settings::{load_config, merge_cli_overrides, validate_servers, CliOverrides};

/// SOCKS5 local proxy for the duskwire tunnel.
#[derive(Parser, Debug)]
#[command(name = "duskwire-local", disable_version_flag = true)]
struct Cli {
    /// Configuration file (JSON).
    #[arg(short = 'c', long = "config")]
    config: Option<String>,

    /// Single-upstream shortcut: tunnel server address.
    #[arg(short = 's', long = "server")]
    server: Option<String>,

    /// Single-upstream shortcut: tunnel server port.
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Single-upstream shortcut: shared secret key.
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Local SOCKS5 listener address.
    #[arg(short = 'b', long = "bind")]
    bind: Option<String>,

    /// Local SOCKS5 listener port.
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

    let servers: Vec<ServerIdentity> = config.server;
    let pool = ServerPool::new(servers);

    let bind_addr = (config.local.address.as_str(), config.local.port);
    let listener = match TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind local SOCKS5 listener on {}:{}: {err}", config.local.address, config.local.port);
            return ExitCode::from(EXIT_SOCKET_ERROR);
        }
    };
    info!(
        "duskwire-local listening on {}:{}",
        config.local.address, config.local.port
    );

    let pool = Arc::new(pool);
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                error!("accept failed: {err}");
                continue;
            }
        };
        let pool = pool.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_client(stream, (*pool).clone()).await {
                info!("connection from {peer} ended: {err}");
            }
        });
    }
}
