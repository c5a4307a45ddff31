use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse trend-data response for window {window}")]
    ResponseParse {
        window: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to create scratch directory")]
    ScratchDirCreation(#[source] std::io::Error),

    #[error("I/O error writing staged window {index} to '{path}'")]
    StageWriteIo {
        index: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoding error writing staged window {index} to '{path}'")]
    StageWritePolars {
        index: usize,
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("I/O error reading staged window {index} from '{path}'")]
    StageReadIo {
        index: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read staged window {index} from '{path}'")]
    StageReadPolars {
        index: usize,
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("Staged window {index} has an unexpected layout: {message}")]
    StageLayout { index: usize, message: String },

    #[error("Window {0} was already staged; stage entries are write-once")]
    DuplicateStage(usize),

    #[error("No staged result for window {0}")]
    UnknownHandle(usize),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Failed processing merged frame: {0}")]
    Merge(#[from] PolarsError),
}
