// Relay and client errors.
//
// `RelayError` covers starting a relay (binding sockets, loading config).
// Once a relay is running, per-connection failures are logged and end only
// that connection; they never surface here.
//
// `ClientError` is what a canvas client sees. `DiscoveryTimeout` is
// recoverable (retry discovery); `ConnectionLost` is terminal for that
// `SessionClient`. A new session needs a fresh discover and connect.
// `MessageTooLarge` rejects one outgoing message before anything is written,
// so the connection stays usable.

use std::io;
use std::path::PathBuf;

use kidpaint_canvas::CanvasError;
use kidpaint_protocol::SessionAddress;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no relay answered discovery after {attempts} attempt(s)")]
    DiscoveryTimeout { attempts: u32 },

    #[error("could not connect to relay at {address}: {source}")]
    Connect {
        address: SessionAddress,
        #[source]
        source: io::Error,
    },

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Canvas(#[from] CanvasError),
}
