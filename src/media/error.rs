use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to capture stdout from {0}")]
    MissingStdout(String),

    #[error("I/O error while talking to child process: {0}")]
    Io(#[from] std::io::Error),

    #[error("Child process timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Child process was cancelled")]
    Cancelled,
}

/// Why one line of tool output could not become a video entry.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,

    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("missing or invalid field `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Metadata fetch failed: {0}")]
    Process(#[from] ProcessError),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Download failed: {0}")]
    Process(#[from] ProcessError),

    #[error("Failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
