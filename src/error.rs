use std::process::ExitStatus;
use std::time::Duration;

/// Error type for recording and post-processing operations.
#[derive(Debug, thiserror::Error)]
pub enum CastError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture process error: {0}")]
    Capture(String),

    #[error("a capture is already running")]
    AlreadyRunning,

    #[error("no capture is running")]
    NotRunning,

    #[error("{tool} not found in PATH; install it and retry")]
    ToolMissing { tool: &'static str },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{tool} did not finish within {timeout:?}")]
    ToolTimedOut {
        tool: &'static str,
        timeout: Duration,
    },

    #[error("invalid video metadata: {raw}")]
    MetadataParse { raw: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CastError {
    /// Process exit code for this error: 2 for capture lifecycle problems,
    /// 3 for external tool failures, 4 for unparseable metadata, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            CastError::Capture(_) | CastError::AlreadyRunning | CastError::NotRunning => 2,
            CastError::ToolMissing { .. }
            | CastError::ToolFailed { .. }
            | CastError::ToolTimedOut { .. } => 3,
            CastError::MetadataParse { .. } => 4,
            CastError::Io(_) | CastError::InvalidConfig(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_partition_by_failure_kind() {
        assert_eq!(CastError::AlreadyRunning.exit_code(), 2);
        assert_eq!(CastError::NotRunning.exit_code(), 2);
        assert_eq!(CastError::ToolMissing { tool: "ffmpeg" }.exit_code(), 3);
        assert_eq!(
            CastError::ToolTimedOut {
                tool: "ffmpeg",
                timeout: Duration::from_secs(1),
            }
            .exit_code(),
            3
        );
        assert_eq!(
            CastError::MetadataParse {
                raw: String::new()
            }
            .exit_code(),
            4
        );
        assert_eq!(CastError::InvalidConfig(String::new()).exit_code(), 1);
    }
}
