use crate::process::ProcessId;
use thiserror::Error;

/// Error types for process operations
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed while waiting for process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("No process matching `{0}`")]
    NotFound(String),

    #[error("Permission denied to signal process {0}")]
    PermissionDenied(ProcessId),

    #[error("Failed to signal process {pid}: {reason}")]
    Signal { pid: ProcessId, reason: String },

    #[error("Process {0} is still running")]
    StillRunning(ProcessId),

    #[error("Operation timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProcessError {
    pub fn launch(command: impl Into<String>, source: std::io::Error) -> Self {
        ProcessError::Launch {
            command: command.into(),
            source,
        }
    }

    /// Check if this error is retryable
    ///
    /// Only a failed lookup is worth retrying: the process may simply not have
    /// reached the process table yet.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcessError::NotFound(_))
    }

    /// Check if this error indicates a permanent failure
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProcessError::Launch { .. } | ProcessError::PermissionDenied(_) | ProcessError::Config(_)
        )
    }
}

pub type ProcessResult<T> = Result<T, ProcessError>;
