//! Error types for queue validation, batch runs and converter invocations

use std::path::PathBuf;

/// Result type for batch operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Reasons a batch run refuses to start
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Already processing videos!")]
    AlreadyRunning,

    #[error("No videos added! Add some MP4 files first.")]
    EmptyQueue,

    #[error("No output folder selected!")]
    MissingOutputDirectory,
}

/// Failure of a single converter invocation
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("failed to launch converter: {0}")]
    Spawn(String),

    #[error("exit code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("converter terminated without exit code: {stderr}")]
    Terminated { stderr: String },

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl ConversionError {
    /// Text shown in the log after "FAILED: <name> - "
    pub fn log_excerpt(&self) -> String {
        match self {
            Self::Failed { stderr, .. } | Self::Terminated { stderr } => stderr.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors that end a batch run or surface from the session
#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("cannot create output folder {}: {source}", path.display())]
    Environment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
