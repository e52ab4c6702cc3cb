use crate::{JobError, JobId, JobStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Accepted { job_id: JobId },
    Rejected { error: JobError },
    /// Tell in-flight work for this job to drop its results.
    CancelInFlight { job_id: JobId },
    Finished { job_id: JobId, status: JobStatus },
    /// A job-scoped update arrived after its job stopped being live.
    StaleUpdateDropped { job_id: JobId },
}
