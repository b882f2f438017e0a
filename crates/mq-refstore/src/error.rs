//! Reference store errors

use mq_score::ScoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Reference store error
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid reference JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Genre key '{genre}' is not a plain file name")]
    InvalidGenre { genre: String },

    #[error("No reference for genre '{genre}' in {}", dir.display())]
    NotFound { genre: String, dir: PathBuf },

    #[error(transparent)]
    Resolve(#[from] ScoreError),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
