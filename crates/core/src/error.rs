use thiserror::Error;

/// Errors surfaced by the tunnel state machines (client and exit side).
#[derive(Error, Debug)]
pub enum DuskwireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported SOCKS version: {0:#x}")]
    BadSocksVersion(u8),

    #[error("no acceptable SOCKS5 auth method")]
    NoAcceptableMethod,

    #[error("unsupported SOCKS5 command: {0:#x}")]
    UnsupportedCommand(u8),

    #[error("unsupported SOCKS5 address type: {0:#x}")]
    UnsupportedAddressType(u8),

    #[error("host name too long for the handshake frame ({0} bytes)")]
    HostTooLong(usize),

    #[error("handshake frame had {got} bytes, expected {expected}")]
    BadHandshakeLength { expected: usize, got: usize },

    #[error("tunnel reply MAGIC mismatch")]
    MagicMismatch,

    #[error("name resolution failed for {0}")]
    ResolutionFailed(String),

    #[error("connect to upstream failed: {0}")]
    ConnectFailed(String),

    #[error("operation timed out")]
    Timeout,

    #[error("no tunnel servers configured")]
    NoServersConfigured,

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DuskwireError>;
