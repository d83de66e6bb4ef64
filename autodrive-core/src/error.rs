//! Errors in the library.
use std::path::PathBuf;
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// The configuration cannot drive a training run.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The simulator refused or dropped the connection.
    #[error("Connection has been refused by the server: {0}")]
    Connection(String),

    /// Reading or writing a checkpoint failed.
    #[error("Checkpoint error at {path:?}: {reason}")]
    Checkpoint {
        /// Location of the checkpoint file.
        path: PathBuf,

        /// Underlying failure.
        reason: String,
    },
}
