use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StopwatchError {
    #[error("no build goals supplied")]
    NoGoals,

    #[error("failed to start '{program}' after {:.2}s: {source}", .elapsed.as_secs_f64())]
    Spawn {
        program: String,
        elapsed: Duration,
        #[source]
        source: std::io::Error,
    },

    #[error("history file {} is not a valid JSON array of runs; refusing to overwrite it: {source}", .path.display())]
    MalformedHistory {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration error in {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StopwatchError {
    /// Process exit code for errors that end the run.
    pub fn exit_code(&self) -> i32 {
        match self {
            StopwatchError::NoGoals => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, StopwatchError>;
