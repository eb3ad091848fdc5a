//! Error types for pollwire.

use thiserror::Error;

use crate::protocol::FramePhase;

/// Main error type for all pollwire operations.
#[derive(Debug, Error)]
pub enum PollwireError {
    /// Port is outside the usable range or bind/listen failed on it.
    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    /// Listener is already bound; close it before opening again.
    #[error("Listener is already open")]
    AlreadyOpen,

    /// Listener was never opened.
    #[error("Listener is not opened")]
    NotOpened,

    /// Port scan was handed a non-empty output list.
    #[error("Port list must be empty before scanning")]
    NonEmptyPortList,

    /// Every port in the configured range failed to open.
    #[error("No port in the pool could be opened")]
    PortPoolExhausted,

    /// Readiness wait expired. Recoverable: the same call may be retried.
    #[error("Poll timed out")]
    PollTimedOut,

    /// The poll itself failed or reported an error condition.
    #[error("Unknown poll result: {0}")]
    UnknownPollResult(std::io::Error),

    /// Socket read failed while receiving a frame.
    #[error("Receive failed while reading {phase}: {source}")]
    ReceiveFailed {
        phase: FramePhase,
        #[source]
        source: std::io::Error,
    },

    /// Peer closed the connection while a frame was being received.
    #[error("Connection closed by peer while reading {phase}")]
    ConnectionClosedOnReceive { phase: FramePhase },

    /// Socket write failed while sending a frame.
    #[error("Send failed: {0}")]
    SendFailed(std::io::Error),

    /// Peer closed the connection while a frame was being sent.
    #[error("Connection closed by peer while sending")]
    ConnectionClosedOnSend,

    /// Message body exceeds the protocol maximum.
    #[error("Message size {size} exceeds maximum {max}")]
    MessageTooBig { size: usize, max: usize },

    /// Sender id is longer than the fixed id field.
    #[error("Id length {0} exceeds 13 bytes")]
    IdTooBig(usize),

    /// Value does not fit the length header.
    #[error("Number {0} too big for length header")]
    NumberTooBig(u32),

    /// Length header input shorter than 3 bytes.
    #[error("Too few bytes for length header: {0}")]
    TooFewBytes(usize),

    /// Length header input longer than 3 bytes.
    #[error("Too many bytes for length header: {0}")]
    TooManyBytes(usize),

    /// Circular buffer cannot satisfy the request.
    #[error("Out of capacity: requested {requested}, available {available}")]
    OutOfCapacity { requested: usize, available: usize },

    /// Request rejected by input validation.
    #[error("Bad input: {0}")]
    BadInput(String),

    /// A request is already outstanding.
    #[error("Connection is busy with another request")]
    AlreadyBusy,

    /// No peer is connected.
    #[error("Not connected")]
    NotConnected,

    /// The connection has been shut down with `exit()`.
    #[error("Connection has exited")]
    ConnectionExited,

    /// Peer did not answer PING with PONG.
    #[error("Liveness check failed: {0}")]
    LivenessFailed(String),

    /// I/O error outside of a frame operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl PollwireError {
    /// True for the recoverable poll timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::PollTimedOut)
    }

    /// True when the peer went away or the socket failed mid-frame.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosedOnReceive { .. }
                | Self::ConnectionClosedOnSend
                | Self::ReceiveFailed { .. }
                | Self::SendFailed(_)
        )
    }
}

/// Result type alias using PollwireError.
pub type Result<T> = std::result::Result<T, PollwireError>;
