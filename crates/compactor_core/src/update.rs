use crate::state::progress;
use crate::{Effect, JobError, JobId, JobState, JobStatus, Msg, TokenStats};

/// Pure update function: applies a message to the job state and returns any
/// effects the caller has to carry out.
pub fn update(mut state: JobState, msg: Msg) -> (JobState, Vec<Effect>) {
    let effects = match msg {
        Msg::StartRequested { job_id, message } => {
            if state.is_running() {
                return (
                    state,
                    vec![Effect::Rejected {
                        error: JobError::AlreadyRunning,
                    }],
                );
            }
            state = JobState {
                job_id: Some(job_id),
                status: JobStatus::Running,
                status_message: message,
                ..JobState::default()
            };
            vec![Effect::Accepted { job_id }]
        }
        Msg::Progress {
            job_id,
            percent,
            message,
        } => {
            if !state.is_live(job_id) {
                return stale(state, job_id);
            }
            state.raise_progress(percent);
            state.status_message = message;
            Vec::new()
        }
        Msg::ChunksPlanned {
            job_id,
            total_chunks,
            original_tokens,
        } => {
            if !state.is_live(job_id) {
                return stale(state, job_id);
            }
            state.total_steps = total_chunks;
            state.token_stats = TokenStats {
                original_tokens,
                ..TokenStats::default()
            };
            state.raise_progress(progress::SETUP_END);
            state.status_message = format!(
                "Compressing {total_chunks} chunk(s), {original_tokens} tokens to process"
            );
            Vec::new()
        }
        Msg::ChunkSettled {
            job_id,
            index: _,
            compressed_tokens,
        } => {
            if !state.is_live(job_id) {
                return stale(state, job_id);
            }
            state.current_step = (state.current_step + 1).min(state.total_steps);
            // Ratio stays unset until the artifact is built.
            state.token_stats.compressed_tokens += compressed_tokens;
            let compressed = state.token_stats.compressed_tokens;
            state.raise_progress(progress::for_chunks(state.current_step, state.total_steps));
            state.status_message = format!(
                "Compressed {}/{} chunks, {} tokens so far",
                state.current_step, state.total_steps, compressed
            );
            Vec::new()
        }
        Msg::Completed { job_id, artifact } => {
            if !state.is_live(job_id) {
                return stale(state, job_id);
            }
            state.status = JobStatus::Completed;
            state.current_step = state.total_steps;
            state.progress_percent = progress::COMPLETE;
            state.token_stats = artifact.stats.clone();
            state.status_message = format!(
                "Complete: {:.1}% reduction ({} -> {} tokens)",
                artifact.stats.ratio, artifact.stats.original_tokens, artifact.stats.compressed_tokens
            );
            state.result = Some(artifact);
            vec![Effect::Finished {
                job_id,
                status: JobStatus::Completed,
            }]
        }
        Msg::Failed { job_id, error } => {
            if !state.is_live(job_id) {
                return stale(state, job_id);
            }
            state.status = JobStatus::Failed;
            state.status_message = format!("Failed: {error}");
            state.result = None;
            state.error = Some(error);
            vec![Effect::Finished {
                job_id,
                status: JobStatus::Failed,
            }]
        }
        Msg::CancelRequested => match state.job_id {
            Some(job_id) if state.is_running() => {
                state.status = JobStatus::Cancelled;
                state.status_message = "Cancelled by user".to_string();
                state.result = None;
                state.error = Some(JobError::CancelledByUser);
                vec![
                    Effect::CancelInFlight { job_id },
                    Effect::Finished {
                        job_id,
                        status: JobStatus::Cancelled,
                    },
                ]
            }
            _ => Vec::new(),
        },
        Msg::Cleared => {
            if !state.is_running() {
                state = JobState::default();
            }
            Vec::new()
        }
    };

    (state, effects)
}

fn stale(state: JobState, job_id: JobId) -> (JobState, Vec<Effect>) {
    (state, vec![Effect::StaleUpdateDropped { job_id }])
}
