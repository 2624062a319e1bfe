use crate::event::DomainEvent;

/// Errors raised by a [`StreamTransport`](crate::transport::StreamTransport)
/// before they are normalized for the public call result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent (connection, TLS, body encoding).
    #[error("request failed: {0}")]
    Request(String),
    /// The server answered with a non-success status before streaming.
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// Reading the response body failed mid-stream.
    #[error("stream read failed: {0}")]
    Read(String),
}

impl TransportError {
    /// Creates a request-level error.
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }

    /// Creates a read error.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read(message.into())
    }

    /// HTTP status associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(_) | Self::Read(_) => None,
        }
    }
}

/// Top-level error type for stream calls.
///
/// Cancellation is deliberately absent: a cancelled call resolves to
/// [`StreamOutcome::Cancelled`](crate::call::StreamOutcome::Cancelled).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid call input, rejected before any request was made.
    #[error("validation error: {0}")]
    Validation(String),
    /// The HTTP exchange failed before or during streaming.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        status_code: Option<u16>,
    },
    /// The server reported an error mid-stream. `partial` holds every event
    /// delivered before the failure.
    #[error("{message}")]
    Stream {
        message: String,
        partial: Vec<DomainEvent>,
    },
    /// Internal invariant violation (e.g. the session task vanished).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Events delivered before a mid-stream failure.
    pub fn partial_results(&self) -> &[DomainEvent] {
        match self {
            Self::Stream { partial, .. } => partial,
            _ => &[],
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(value: TransportError) -> Self {
        ClientError::Transport {
            status_code: value.status_code(),
            message: value.to_string(),
        }
    }
}
