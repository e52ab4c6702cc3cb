use compactor_core::{
    update, Artifact, ConversationMetadata, Effect, JobError, JobState, JobStatus, Msg, TokenStats,
};

fn init_logging() {
    compactor_logging::initialize_for_tests();
}

fn start(state: JobState, job_id: u64) -> (JobState, Vec<Effect>) {
    update(
        state,
        Msg::StartRequested {
            job_id,
            message: "Starting".to_string(),
        },
    )
}

fn plan(state: JobState, job_id: u64, total_chunks: usize, original_tokens: u64) -> JobState {
    update(
        state,
        Msg::ChunksPlanned {
            job_id,
            total_chunks,
            original_tokens,
        },
    )
    .0
}

fn settle(state: JobState, job_id: u64, index: usize, compressed_tokens: u64) -> JobState {
    update(
        state,
        Msg::ChunkSettled {
            job_id,
            index,
            compressed_tokens,
        },
    )
    .0
}

fn artifact(original: u64, compressed: u64) -> Artifact {
    Artifact {
        combined_text: "compressed".to_string(),
        stats: TokenStats::new(original, compressed),
        source: ConversationMetadata::default(),
        message_count: 4,
        chunk_count: 2,
        method: "test".to_string(),
    }
}

#[test]
fn start_from_idle_is_accepted() {
    init_logging();
    let (state, effects) = start(JobState::new(), 1);
    assert_eq!(effects, vec![Effect::Accepted { job_id: 1 }]);
    assert_eq!(state.status, JobStatus::Running);
    assert_eq!(state.job_id, Some(1));
    assert_eq!(state.progress_percent, 0);
}

#[test]
fn second_start_while_running_is_rejected_without_mutation() {
    init_logging();
    let (state, _) = start(JobState::new(), 1);
    let state = plan(state, 1, 3, 300);
    let state = settle(state, 1, 0, 20);
    let before = state.clone();

    let (after, effects) = start(state, 2);
    assert_eq!(
        effects,
        vec![Effect::Rejected {
            error: JobError::AlreadyRunning
        }]
    );
    assert_eq!(after, before);
}

#[test]
fn start_after_terminal_state_replaces_it() {
    init_logging();
    let (state, _) = start(JobState::new(), 1);
    let (state, _) = update(state, Msg::CancelRequested);
    let (state, effects) = start(state, 2);
    assert_eq!(effects, vec![Effect::Accepted { job_id: 2 }]);
    assert_eq!(state.error, None);
    assert_eq!(state.job_id, Some(2));
}

#[test]
fn chunk_settlements_advance_progress_monotonically() {
    init_logging();
    let (state, _) = start(JobState::new(), 7);
    let mut state = plan(state, 7, 4, 400);
    assert_eq!(state.progress_percent, 20);
    assert_eq!(state.total_steps, 4);

    let mut last = state.progress_percent;
    for index in [3, 0, 2, 1] {
        state = settle(state, 7, index, 25);
        assert!(state.progress_percent >= last);
        assert!(state.progress_percent < 100);
        last = state.progress_percent;
    }
    assert_eq!(state.current_step, 4);
    assert_eq!(state.progress_percent, 80);
    assert_eq!(state.token_stats.compressed_tokens, 100);
    assert_eq!(state.status, JobStatus::Running);
}

#[test]
fn progress_messages_cannot_move_backwards_or_hit_100() {
    init_logging();
    let (state, _) = start(JobState::new(), 1);
    let (state, _) = update(
        state,
        Msg::Progress {
            job_id: 1,
            percent: 90,
            message: "Finalizing".into(),
        },
    );
    let (state, _) = update(
        state,
        Msg::Progress {
            job_id: 1,
            percent: 10,
            message: "late".into(),
        },
    );
    assert_eq!(state.progress_percent, 90);
    let (state, _) = update(
        state,
        Msg::Progress {
            job_id: 1,
            percent: 100,
            message: "too eager".into(),
        },
    );
    assert_eq!(state.progress_percent, 99);
    assert_eq!(state.status, JobStatus::Running);
}

#[test]
fn completion_attaches_artifact_and_reaches_100() {
    init_logging();
    let (state, _) = start(JobState::new(), 3);
    let state = plan(state, 3, 2, 9000);
    let state = settle(state, 3, 1, 1100);
    let state = settle(state, 3, 0, 1200);
    let (state, effects) = update(
        state,
        Msg::Completed {
            job_id: 3,
            artifact: artifact(9000, 2300),
        },
    );

    assert_eq!(
        effects,
        vec![Effect::Finished {
            job_id: 3,
            status: JobStatus::Completed
        }]
    );
    assert_eq!(state.status, JobStatus::Completed);
    assert_eq!(state.progress_percent, 100);
    assert!((state.token_stats.ratio - 74.4).abs() < 1e-9);
    assert!(state.result.is_some());
}

#[test]
fn first_failure_wins_and_later_updates_are_dropped() {
    init_logging();
    let (state, _) = start(JobState::new(), 5);
    let state = plan(state, 5, 3, 300);
    let state = settle(state, 5, 0, 10);
    let first = JobError::ChunkCompressionFailure {
        index: 1,
        message: "http 500".into(),
    };
    let (state, _) = update(
        state,
        Msg::Failed {
            job_id: 5,
            error: first.clone(),
        },
    );
    let (state, effects) = update(
        state,
        Msg::Failed {
            job_id: 5,
            error: JobError::ChunkCompressionFailure {
                index: 2,
                message: "network".into(),
            },
        },
    );
    assert_eq!(effects, vec![Effect::StaleUpdateDropped { job_id: 5 }]);

    let state = settle(state, 5, 2, 10);
    let (state, _) = update(
        state,
        Msg::Completed {
            job_id: 5,
            artifact: artifact(300, 20),
        },
    );

    assert_eq!(state.status, JobStatus::Failed);
    assert_eq!(state.error, Some(first));
    assert_eq!(state.result, None);
    assert_eq!(state.current_step, 1);
}

#[test]
fn cancel_is_idempotent_and_signals_in_flight_work_once() {
    init_logging();
    let (state, _) = start(JobState::new(), 9);
    let state = plan(state, 9, 2, 100);
    let (once, effects) = update(state, Msg::CancelRequested);
    assert_eq!(
        effects,
        vec![
            Effect::CancelInFlight { job_id: 9 },
            Effect::Finished {
                job_id: 9,
                status: JobStatus::Cancelled
            }
        ]
    );
    let (twice, effects) = update(once.clone(), Msg::CancelRequested);
    assert!(effects.is_empty());
    assert_eq!(once, twice);
    assert_eq!(twice.status, JobStatus::Cancelled);
    assert_eq!(twice.error, Some(JobError::CancelledByUser));

    let after = settle(twice.clone(), 9, 0, 50);
    assert_eq!(after, twice);
}

#[test]
fn cancel_without_running_job_is_a_noop() {
    init_logging();
    let (state, effects) = update(JobState::new(), Msg::CancelRequested);
    assert!(effects.is_empty());
    assert_eq!(state, JobState::new());
}

#[test]
fn updates_for_a_previous_job_are_ignored() {
    init_logging();
    let (state, _) = start(JobState::new(), 1);
    let (state, _) = update(state, Msg::CancelRequested);
    let (state, _) = update(state, Msg::Cleared);
    let (state, _) = start(state, 2);
    let state = plan(state, 2, 2, 100);

    let before = state.clone();
    let after = settle(state, 1, 0, 99);
    assert_eq!(after, before);
}

#[test]
fn clear_resets_terminal_state_but_not_a_running_job() {
    init_logging();
    let (running, _) = start(JobState::new(), 1);
    let (still_running, _) = update(running.clone(), Msg::Cleared);
    assert_eq!(still_running, running);

    let (failed, _) = update(
        running,
        Msg::Failed {
            job_id: 1,
            error: JobError::NoContentFound,
        },
    );
    let (cleared, _) = update(failed, Msg::Cleared);
    assert_eq!(cleared, JobState::new());
}
