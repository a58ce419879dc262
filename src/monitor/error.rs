// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid wildcard pattern: {0}")]
    InvalidGlob(String),

    #[error("Directory {0:?} not found. Ensure it is a directory.")]
    DirectoryNotFound(PathBuf),

    #[error("Unable to find any file with name {pattern:?} in {dir:?}")]
    FileNotFound { dir: PathBuf, pattern: String },

    #[error("Unable to read file {path:?}: {source}")]
    FileNotReadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Position store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Read error in {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Start offset {offset} is beyond end of file ({len} bytes)")]
    OffsetBeyondEnd { offset: u64, len: u64 },
}

impl Error {
    /// Whether the error comes from the log's own configuration rather than
    /// the files it points at.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Config(_) | Error::InvalidGlob(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
