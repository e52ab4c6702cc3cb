use serde::{Deserialize, Serialize};

use crate::conversation::ConversationMetadata;
use crate::JobError;

pub type JobId = u64;

/// Progress bands. Setup fills 0..20, chunk compression 20..80 and
/// finalization 80..99. Only `Completed` reports 100.
pub mod progress {
    pub const SETUP_END: u8 = 20;
    pub const COMPRESSION_END: u8 = 80;
    pub const FINALIZING: u8 = 90;
    pub const MAX_WHILE_RUNNING: u8 = 99;
    pub const COMPLETE: u8 = 100;

    pub fn for_chunks(completed: usize, total: usize) -> u8 {
        if total == 0 {
            return COMPRESSION_END;
        }
        let span = u64::from(COMPRESSION_END - SETUP_END);
        let done = completed.min(total) as u64;
        SETUP_END + (done * span / total as u64) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenStats {
    pub original_tokens: u64,
    pub compressed_tokens: u64,
    /// Negative when the service returned more text than it was given.
    pub tokens_saved: i64,
    /// Reduction in percent, one decimal.
    pub ratio: f64,
}

impl TokenStats {
    pub fn new(original_tokens: u64, compressed_tokens: u64) -> Self {
        let tokens_saved = original_tokens as i64 - compressed_tokens as i64;
        let ratio = if original_tokens == 0 {
            0.0
        } else {
            let raw = tokens_saved as f64 / original_tokens as f64 * 100.0;
            (raw * 10.0).round() / 10.0
        };
        Self {
            original_tokens,
            compressed_tokens,
            tokens_saved,
            ratio,
        }
    }
}

/// The combined compressed document of a completed job. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub combined_text: String,
    pub stats: TokenStats,
    pub source: ConversationMetadata,
    pub message_count: usize,
    pub chunk_count: usize,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: Option<JobId>,
    pub status: JobStatus,
    pub current_step: usize,
    pub total_steps: usize,
    pub progress_percent: u8,
    pub status_message: String,
    pub result: Option<Artifact>,
    pub error: Option<JobError>,
    pub token_stats: TokenStats,
}

impl JobState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    /// True while `job_id` still owns the state and has not reached a
    /// terminal status. Every job-scoped update is gated on this.
    pub fn is_live(&self, job_id: JobId) -> bool {
        self.is_running() && self.job_id == Some(job_id)
    }

    pub(crate) fn raise_progress(&mut self, percent: u8) {
        let capped = percent.min(progress::MAX_WHILE_RUNNING);
        self.progress_percent = self.progress_percent.max(capped);
    }
}
