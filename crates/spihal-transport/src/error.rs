/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The port setting is not a valid TCP port number.
    #[error("invalid port setting '{value}'")]
    InvalidPort { value: String },

    /// Host name resolution failed.
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        source: std::io::Error,
    },

    /// Resolution succeeded but produced no addresses.
    #[error("no addresses resolved for {endpoint}")]
    NoAddress { endpoint: String },

    /// Every resolved address refused or failed the connection.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to bind a listening socket.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
