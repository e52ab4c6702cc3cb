use crate::{Artifact, JobError, JobId};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// An observer asked to start a new job.
    StartRequested { job_id: JobId, message: String },
    /// Setup or finalization advanced; percent is clamped below 100.
    Progress {
        job_id: JobId,
        percent: u8,
        message: String,
    },
    /// The text was chunked and compression is about to fan out.
    ChunksPlanned {
        job_id: JobId,
        total_chunks: usize,
        original_tokens: u64,
    },
    /// One chunk came back compressed.
    ChunkSettled {
        job_id: JobId,
        index: usize,
        compressed_tokens: u64,
    },
    /// All chunks settled and were reassembled.
    Completed { job_id: JobId, artifact: Artifact },
    /// The job hit a terminal error. The first one wins.
    Failed { job_id: JobId, error: JobError },
    /// User asked to cancel whatever is running.
    CancelRequested,
    /// Observer consumed a terminal state.
    Cleared,
}
