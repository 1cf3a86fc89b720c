use thiserror::Error;

use crate::frames::{GoAwayStatus, StreamStatus};

/// Errors that end the whole session.
///
/// Every variant is fatal: the session sends GOAWAY where it still can,
/// terminates all active streams, and closes the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The peer violated the protocol. Carries a static reason used for the
    /// log line; the wire carries `GoAwayStatus::PROTOCOL_ERROR`.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    /// The peer sent GOAWAY and the session has finished draining, or a
    /// stream above the last-good id was abandoned by it.
    #[error("session went away: {0:?}")]
    GoAway(GoAwayStatus),

    /// The transport failed. No GOAWAY can be sent on this path.
    #[error("transport error: {0}")]
    Transport(String),

    /// Internal failure on our side, reported to the peer as
    /// `GoAwayStatus::INTERNAL_ERROR`.
    #[error("internal error: {0}")]
    Internal(&'static str),

    /// The session is already closed; late operations get this.
    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// Status carried by the GOAWAY frame announcing this error.
    pub fn goaway_status(&self) -> GoAwayStatus {
        match self {
            Self::Protocol(_) => GoAwayStatus::PROTOCOL_ERROR,
            Self::GoAway(status) => *status,
            Self::Internal(_) => GoAwayStatus::INTERNAL_ERROR,
            Self::Transport(_) | Self::Closed => GoAwayStatus::INTERNAL_ERROR,
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Errors terminating a single stream; the session survives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The stream was reset, by the peer or locally.
    #[error("stream reset: {0:?}")]
    Rst(StreamStatus),

    /// A decoded header block exceeded the configured size limit.
    #[error("header block exceeds {0} bytes")]
    HeadersTooLarge(usize),

    /// The stream was dragged down by a session-fatal error.
    #[error(transparent)]
    Session(#[from] SessionError),
}
