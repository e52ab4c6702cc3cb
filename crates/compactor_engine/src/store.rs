use std::sync::{Mutex, MutexGuard, PoisonError};

use compactor_core::{update, Effect, JobState, Msg};
use compactor_logging::{compactor_debug, compactor_info, compactor_warn};
use tokio::sync::watch;

/// Holds the single current job's state.
///
/// Every mutation runs the pure reducer under one lock and publishes the new
/// snapshot before the lock is released, so polling readers and `watch`
/// subscribers both observe a monotonic sequence of states.
pub struct JobStateStore {
    state: Mutex<JobState>,
    publisher: watch::Sender<JobState>,
}

impl JobStateStore {
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(JobState::default());
        Self {
            state: Mutex::new(JobState::default()),
            publisher,
        }
    }

    pub fn get(&self) -> JobState {
        self.lock().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.publisher.subscribe()
    }

    pub fn apply(&self, msg: Msg) -> Vec<Effect> {
        let mut guard = self.lock();
        let current = std::mem::take(&mut *guard);
        let (next, effects) = update(current, msg);
        self.publisher.send_replace(next.clone());
        *guard = next;
        drop(guard);

        for effect in &effects {
            log_effect(effect);
        }
        effects
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        // The reducer cannot panic halfway through a mutation, so a poisoned
        // lock still guards a consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for JobStateStore {
    fn default() -> Self {
        Self::new()
    }
}

fn log_effect(effect: &Effect) {
    match effect {
        Effect::Accepted { job_id } => compactor_info!("job {} accepted", job_id),
        Effect::Rejected { error } => compactor_warn!("start rejected: {}", error),
        Effect::CancelInFlight { job_id } => {
            compactor_info!("job {} cancelled, in-flight results will be dropped", job_id)
        }
        Effect::Finished { job_id, status } => {
            compactor_info!("job {} finished with {:?}", job_id, status)
        }
        Effect::StaleUpdateDropped { job_id } => {
            compactor_debug!("dropped update for job {} (no longer running)", job_id)
        }
    }
}
