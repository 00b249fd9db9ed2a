//! Error taxonomy shared by every stream operation.
//!
//! I/O failures pass through untouched (`ZtreamError::Io`); nothing in this
//! crate retries.  Structural problems found on disk are reported as
//! [`ZtreamError::Corrupt`] with the file path and the offending byte offset.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::header::HeaderError;

pub type Result<T> = std::result::Result<T, ZtreamError>;

#[derive(Error, Debug)]
pub enum ZtreamError {
    /// The append would not leave room for the data and the final directory.
    #[error("ztream: the provided data does not fit in the stream")]
    StreamFull,

    #[error("ztream: buffer of {provided} bytes cannot hold {needed} bytes of entry data")]
    BufferTooSmall { needed: usize, provided: usize },

    #[error("{}:{offset} {message}", path.display())]
    Corrupt {
        path:    PathBuf,
        offset:  u64,
        message: String,
    },

    #[error("ztream: no such entry: {0}")]
    NotFound(String),

    #[error("ztream: name of {len} bytes exceeds the maximum of {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("ztream: an entry named {0:?} is already stored")]
    DuplicateName(String),

    #[error("ztream: invalid options: {0}")]
    InvalidOptions(String),

    #[error("ztream: stream is closed")]
    Closed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ZtreamError {
    pub(crate) fn corrupt(path: &Path, offset: u64, message: impl Into<String>) -> Self {
        ZtreamError::Corrupt {
            path:    path.to_owned(),
            offset,
            message: message.into(),
        }
    }

    /// Attach the container path to a codec-level error.
    pub(crate) fn from_header(path: &Path, err: HeaderError) -> Self {
        match err {
            HeaderError::Corrupt { offset, message } => Self::corrupt(path, offset, message),
            HeaderError::Io(e) => ZtreamError::Io(e),
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, ZtreamError::Corrupt { .. })
    }
}
