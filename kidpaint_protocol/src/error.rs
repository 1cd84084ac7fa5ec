// Protocol errors.
//
// Everything that can go wrong while reading a frame off a stream. I/O
// failures (including a stream that closes mid-frame) stay distinct from
// decode failures so the relay can tell a vanished client from one that is
// speaking something other than this protocol. Both end the connection.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unknown message kind {0}")]
    UnknownKind(i32),

    #[error("invalid payload length {length} (max {max})")]
    BadLength { length: i32, max: u32 },

    #[error("malformed {kind} payload: {reason}")]
    Malformed { kind: &'static str, reason: String },
}

impl ProtocolError {
    /// True for decode failures (the peer sent bytes that are not a valid
    /// frame), false for transport failures.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, ProtocolError::Io(_))
    }

    /// True when the peer closed the stream, cleanly or mid-frame.
    pub fn is_eof(&self) -> bool {
        matches!(self, ProtocolError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}
