use serde::{Deserialize, Serialize};

/// Everything that can end or refuse a job. Captured into `JobState::error`;
/// nothing escapes the job boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum JobError {
    #[error("a compression job is already running")]
    AlreadyRunning,
    #[error("no API credential configured")]
    MissingCredential,
    #[error("chunk {index} failed to compress: {message}")]
    ChunkCompressionFailure { index: usize, message: String },
    #[error("cancelled by user")]
    CancelledByUser,
    #[error("no conversation messages found")]
    NoContentFound,
}

impl JobError {
    /// Cancellation is terminal but is not reported as a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, JobError::CancelledByUser)
    }
}
