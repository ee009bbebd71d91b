use std::io;
use thiserror::Error;

/// Failures of the command link.
///
/// None of these are fatal to the gate: callers log them and carry on.
#[derive(Debug, Error)]
pub enum TransportError {
    /// `send` was called before a channel was established.
    #[error("door link is not connected")]
    NotConnected,

    /// Write or read failure on an established channel.
    #[error("i/o failure on door link: {0}")]
    Io(#[from] io::Error),

    #[error("failed to open serial port {port}: {source}")]
    Open {
        port:   String,
        #[source]
        source: serialport::Error,
    },

    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(#[source] serialport::Error),

    /// The dispatcher thread is no longer running.
    #[error("door link worker has stopped")]
    WorkerGone,
}

impl TransportError {
    pub fn is_not_connected(&self) -> bool {
        matches!(self, TransportError::NotConnected)
    }
}
