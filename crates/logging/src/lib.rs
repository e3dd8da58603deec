//! Tracing setup shared by both binaries.
//!
//! `RUST_LOG` overrides the default; otherwise everything logs at
//! `info` except the `duskwire` target tree, which logs at `debug` —
//! loud enough to see state transitions (spec §4) without drowning in
//! tokio/runtime noise.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber. Call once, at the top of `main`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,duskwire=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
