// Canvas errors. Only file import/export can fail; painting, filling, and
// history operations resolve bad coordinates and empty stacks as no-ops.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("grid file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("grid file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("grid file {path}: {reason}")]
    InvalidGrid { path: PathBuf, reason: String },

    #[error("grid is {found_width}x{found_height}, canvas is {width}x{height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        found_width: u32,
        found_height: u32,
    },
}

pub type Result<T> = std::result::Result<T, CanvasError>;
