//! Bolt protocol error types.

use std::fmt;
use std::io;

use super::handshake::BoltVersion;
use super::packstream::PackStreamError;

/// Result type for Bolt operations.
pub type BoltResult<T> = Result<T, BoltError>;

/// Wire-level errors raised while talking to a server.
#[derive(Debug)]
pub enum BoltError {
    /// I/O error
    Io(io::Error),

    /// Handshake error
    Handshake(HandshakeError),

    /// PackStream serialization error
    PackStream(PackStreamError),

    /// Protocol error (unexpected message, invalid framing, ...)
    Protocol(String),

    /// Message too large
    MessageTooLarge { size: usize, max: usize },

    /// Peer closed the stream
    ConnectionClosed,
}

impl fmt::Display for BoltError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoltError::Io(e) => write!(f, "I/O error: {}", e),
            BoltError::Handshake(e) => write!(f, "Handshake error: {}", e),
            BoltError::PackStream(e) => write!(f, "PackStream error: {}", e),
            BoltError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            BoltError::MessageTooLarge { size, max } => {
                write!(f, "Message too large: {} bytes (max: {})", size, max)
            }
            BoltError::ConnectionClosed => write!(f, "Connection closed by server"),
        }
    }
}

impl std::error::Error for BoltError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BoltError::Io(e) => Some(e),
            BoltError::Handshake(e) => Some(e),
            BoltError::PackStream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BoltError {
    fn from(err: io::Error) -> Self {
        BoltError::Io(err)
    }
}

impl From<HandshakeError> for BoltError {
    fn from(err: HandshakeError) -> Self {
        BoltError::Handshake(err)
    }
}

impl From<PackStreamError> for BoltError {
    fn from(err: PackStreamError) -> Self {
        BoltError::PackStream(err)
    }
}

/// Handshake-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Server answered with all zeros: none of the proposals is acceptable
    NoCompatibleVersion,

    /// Server picked a version the client never proposed
    UnsupportedVersion(BoltVersion),

    /// Server replied with an HTTP response
    HttpResponse,

    /// Invalid handshake data (wrong size, etc.)
    InvalidData(String),
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::NoCompatibleVersion => {
                write!(f, "No compatible protocol version found")
            }
            HandshakeError::UnsupportedVersion(v) => {
                write!(f, "Server negotiated unsupported protocol version {}", v)
            }
            HandshakeError::HttpResponse => {
                write!(f, "Server responded with HTTP; check that the Bolt port is used")
            }
            HandshakeError::InvalidData(msg) => {
                write!(f, "Invalid handshake data: {}", msg)
            }
        }
    }
}

impl std::error::Error for HandshakeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display() {
        let err = BoltError::MessageTooLarge { size: 20, max: 10 };
        assert_eq!(err.to_string(), "Message too large: 20 bytes (max: 10)");

        let err = BoltError::from(HandshakeError::UnsupportedVersion(BoltVersion::new(4, 0)));
        assert!(err.to_string().contains("4.0"));
    }

    #[test]
    fn test_source_chain() {
        let err = BoltError::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert!(err.source().is_some());
        assert!(BoltError::Protocol("x".into()).source().is_none());
    }
}
