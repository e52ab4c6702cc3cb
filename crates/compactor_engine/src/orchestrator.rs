use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use compactor_core::{
    progress, reassemble, Artifact, CharRatioTokenCounter, Chunk, ChunkResult, Chunker,
    ConversationDocument, Effect, JobError, JobId, JobState, Msg, TokenCounter, TokenStats,
};
use compactor_logging::{compactor_debug, compactor_info, compactor_warn};
use futures_util::future::join_all;
use tokio::runtime::Handle;
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::{CompressionClient, Credential, JobStateStore};

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Upper bound on simultaneous compression calls. `None` dispatches
    /// every chunk at once.
    pub max_in_flight: Option<usize>,
    /// Label recorded on the artifact and printed in the export header.
    pub method_label: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_in_flight: None,
            method_label: "Chunked parallel compression".to_string(),
        }
    }
}

/// Runs compression jobs, one at a time, on a tokio runtime.
pub struct JobOrchestrator {
    store: Arc<JobStateStore>,
    client: Arc<dyn CompressionClient>,
    counter: Arc<dyn TokenCounter>,
    settings: OrchestratorSettings,
    runtime: Handle,
    next_job_id: AtomicU64,
    active: Mutex<Option<(JobId, CancellationToken)>>,
}

impl JobOrchestrator {
    pub fn new(client: Arc<dyn CompressionClient>, runtime: Handle) -> Self {
        Self::with_settings(
            client,
            runtime,
            OrchestratorSettings::default(),
            Arc::new(CharRatioTokenCounter::default()),
        )
    }

    pub fn with_settings(
        client: Arc<dyn CompressionClient>,
        runtime: Handle,
        settings: OrchestratorSettings,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            store: Arc::new(JobStateStore::new()),
            client,
            counter,
            settings,
            runtime,
            next_job_id: AtomicU64::new(1),
            active: Mutex::new(None),
        }
    }

    pub fn state(&self) -> JobState {
        self.store.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.store.subscribe()
    }

    /// Starts a job, or returns `AlreadyRunning` without touching the active
    /// one. A missing credential or an empty document is accepted and then
    /// failed immediately, before any network call.
    pub fn start(
        &self,
        document: ConversationDocument,
        credential: Option<Credential>,
        chunk_size_tokens: u32,
    ) -> Result<JobId, JobError> {
        // Held across acceptance so a concurrent cancel always finds the token.
        let mut active = self.lock_active();

        let job_id = self.next_job_id.fetch_add(1, Ordering::Relaxed);
        let effects = self.store.apply(Msg::StartRequested {
            job_id,
            message: "Preparing conversation".to_string(),
        });
        if let Some(error) = effects.into_iter().find_map(|effect| match effect {
            Effect::Rejected { error } => Some(error),
            _ => None,
        }) {
            return Err(error);
        }

        compactor_logging::set_active_job(job_id);
        let token = CancellationToken::new();
        *active = Some((job_id, token.clone()));
        drop(active);

        let Some(credential) = credential else {
            self.store.apply(Msg::Failed {
                job_id,
                error: JobError::MissingCredential,
            });
            return Ok(job_id);
        };
        if document.is_empty() {
            self.store.apply(Msg::Failed {
                job_id,
                error: JobError::NoContentFound,
            });
            return Ok(job_id);
        }

        compactor_info!(
            "starting compression of {} messages, chunk budget {} tokens",
            document.message_count(),
            chunk_size_tokens
        );
        let job = CompressionJob {
            job_id,
            document,
            credential,
            chunk_size_tokens,
            store: self.store.clone(),
            client: self.client.clone(),
            counter: self.counter.clone(),
            settings: self.settings.clone(),
            token,
        };
        self.runtime.spawn(job.run());
        Ok(job_id)
    }

    /// Requests cooperative cancellation. Returns whether anything was
    /// running; repeated calls are no-ops.
    pub fn cancel(&self) -> bool {
        let active = self.lock_active();
        let effects = self.store.apply(Msg::CancelRequested);
        let mut cancelled = false;
        for effect in effects {
            if let Effect::CancelInFlight { job_id } = effect {
                if let Some((active_id, token)) = active.as_ref() {
                    if *active_id == job_id {
                        token.cancel();
                    }
                }
                cancelled = true;
            }
        }
        cancelled
    }

    /// Returns a terminal job to Idle. Ignored while a job is running.
    pub fn clear(&self) {
        let mut active = self.lock_active();
        self.store.apply(Msg::Cleared);
        if !self.store.get().is_running() {
            *active = None;
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<(JobId, CancellationToken)>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct CompressionJob {
    job_id: JobId,
    document: ConversationDocument,
    credential: Credential,
    chunk_size_tokens: u32,
    store: Arc<JobStateStore>,
    client: Arc<dyn CompressionClient>,
    counter: Arc<dyn TokenCounter>,
    settings: OrchestratorSettings,
    token: CancellationToken,
}

impl CompressionJob {
    async fn run(self) {
        let job_id = self.job_id;

        self.store.apply(Msg::Progress {
            job_id,
            percent: 5,
            message: format!("Flattening {} messages", self.document.message_count()),
        });
        let text = self.document.flatten();
        let original_tokens = self.counter.count(&text);
        self.store.apply(Msg::Progress {
            job_id,
            percent: 10,
            message: format!("Estimated {original_tokens} tokens"),
        });

        let chunks = Chunker::new(self.counter.as_ref(), self.chunk_size_tokens).split(&text);
        if chunks.is_empty() {
            self.store.apply(Msg::Failed {
                job_id,
                error: JobError::NoContentFound,
            });
            return;
        }
        compactor_info!(
            "split {} tokens into {} chunk(s)",
            original_tokens,
            chunks.len()
        );
        self.store.apply(Msg::ChunksPlanned {
            job_id,
            total_chunks: chunks.len(),
            original_tokens: u64::from(original_tokens),
        });

        let results = self.fan_out(chunks).await;

        if self.token.is_cancelled() || !self.store.get().is_live(job_id) {
            compactor_debug!("job no longer running, discarding {} results", results.len());
            return;
        }

        self.store.apply(Msg::Progress {
            job_id,
            percent: progress::FINALIZING,
            message: "Reassembling compressed chunks".to_string(),
        });
        let reassembled = match reassemble(results) {
            Ok(reassembled) => reassembled,
            Err(error) => {
                self.store.apply(Msg::Failed { job_id, error });
                return;
            }
        };

        let stats = TokenStats::new(u64::from(original_tokens), reassembled.compressed_tokens);
        let artifact = Artifact {
            combined_text: reassembled.combined_text,
            stats,
            source: self.document.metadata.clone(),
            message_count: self.document.message_count(),
            chunk_count: reassembled.chunk_count,
            method: self.settings.method_label.clone(),
        };
        self.store.apply(Msg::Completed { job_id, artifact });
    }

    /// Scatter every chunk onto its own task, then gather one result per
    /// chunk. Completion order is irrelevant; callers sort by index.
    async fn fan_out(&self, chunks: Vec<Chunk>) -> Vec<ChunkResult> {
        let limiter = self
            .settings
            .max_in_flight
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

        let handles = chunks
            .into_iter()
            .map(|chunk| {
                let index = chunk.index;
                let task = ChunkTask {
                    job_id: self.job_id,
                    chunk,
                    credential: self.credential.clone(),
                    store: self.store.clone(),
                    client: self.client.clone(),
                    counter: self.counter.clone(),
                    token: self.token.clone(),
                    limiter: limiter.clone(),
                };
                (index, tokio::spawn(task.run()))
            })
            .collect::<Vec<_>>();

        join_all(handles.into_iter().map(|(index, handle)| async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => ChunkResult::Failed {
                    index,
                    error: format!("chunk task aborted: {err}"),
                },
            }
        }))
        .await
    }
}

struct ChunkTask {
    job_id: JobId,
    chunk: Chunk,
    credential: Credential,
    store: Arc<JobStateStore>,
    client: Arc<dyn CompressionClient>,
    counter: Arc<dyn TokenCounter>,
    token: CancellationToken,
    limiter: Option<Arc<Semaphore>>,
}

impl ChunkTask {
    async fn run(self) -> ChunkResult {
        let index = self.chunk.index;
        let _permit = match &self.limiter {
            Some(limiter) => limiter.clone().acquire_owned().await.ok(),
            None => None,
        };
        if self.token.is_cancelled() {
            return ChunkResult::Failed {
                index,
                error: "job stopped before dispatch".to_string(),
            };
        }

        let outcome = self.client.compress(&self.credential, &self.chunk.text).await;

        // Liveness check: a stopped job keeps nothing from late completions.
        if self.token.is_cancelled() {
            compactor_debug!("discarding late result for chunk {}", index);
            return ChunkResult::Failed {
                index,
                error: "job stopped before completion".to_string(),
            };
        }

        match outcome {
            Ok(compressed_text) => {
                let compressed_tokens = self.counter.count(&compressed_text);
                self.store.apply(Msg::ChunkSettled {
                    job_id: self.job_id,
                    index,
                    compressed_tokens: u64::from(compressed_tokens),
                });
                ChunkResult::Compressed {
                    index,
                    original_tokens: self.chunk.estimated_tokens,
                    compressed_tokens,
                    compressed_text,
                }
            }
            Err(err) => {
                compactor_warn!("chunk {} failed: {}", index, err);
                let message = err.to_string();
                self.store.apply(Msg::Failed {
                    job_id: self.job_id,
                    error: JobError::ChunkCompressionFailure {
                        index,
                        message: message.clone(),
                    },
                });
                // Fail fast: queued chunks skip their calls, in-flight ones drop results.
                self.token.cancel();
                ChunkResult::Failed {
                    index,
                    error: message,
                }
            }
        }
    }
}
