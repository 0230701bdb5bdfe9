// spl_gateway/src/error.rs

use mav_channel_utils::ChannelError;
use thiserror::Error;

/// Errors raised by the gateway core.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// A channel operation failed. See [`GatewayError::is_connection_loss`].
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: ChannelError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    /// Loading or saving the vehicle shadow snapshot failed.
    #[error("shadow state error: {0}")]
    Shadow(String),

    /// Addressed delivery to a session that is not in the registry.
    #[error("session '{0}' is not registered")]
    UnknownSession(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// True when the error means the client's transport is gone and its session
    /// must be closed.
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, GatewayError::Channel(e) if e.is_fatal())
    }
}
