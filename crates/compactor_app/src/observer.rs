//! Terminal progress observer: starts one job, polls it to a terminal
//! status, renders the result once and returns the store to Idle.

use std::future::Future;
use std::io::Write;
use std::pin::pin;
use std::time::Duration;

use anyhow::{bail, Result};
use compactor_core::{Artifact, ConversationDocument, JobError, JobState, JobStatus};
use compactor_engine::{Credential, JobOrchestrator};
use compactor_logging::{compactor_debug, compactor_info};
use tokio::time::MissedTickBehavior;

/// What a finished job produced, after the store has been cleared.
#[derive(Debug)]
pub enum Outcome {
    Completed(Artifact),
    Failed(JobError),
    Cancelled,
}

pub struct ProgressObserver<'a, W: Write> {
    orchestrator: &'a JobOrchestrator,
    poll_interval: Duration,
    out: W,
}

impl<'a, W: Write> ProgressObserver<'a, W> {
    pub fn new(orchestrator: &'a JobOrchestrator, poll_interval: Duration, out: W) -> Self {
        Self {
            orchestrator,
            poll_interval,
            out,
        }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.out
    }

    /// Starts a job and follows it to completion.
    ///
    /// `interrupt` resolving requests cancellation once; it is not polled
    /// again afterwards. A second start while a job is running surfaces
    /// `JobError::AlreadyRunning`.
    pub async fn run(
        &mut self,
        document: ConversationDocument,
        credential: Option<Credential>,
        chunk_size_tokens: u32,
        interrupt: impl Future<Output = ()>,
    ) -> Result<Outcome> {
        let job_id = self
            .orchestrator
            .start(document, credential, chunk_size_tokens)?;
        compactor_debug!("polling job state every {:?}", self.poll_interval);

        let mut interrupt = pin!(interrupt);
        let mut cancel_sent = false;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_rendered: Option<(u8, String)> = None;

        loop {
            tokio::select! {
                _ = &mut interrupt, if !cancel_sent => {
                    cancel_sent = true;
                    if self.orchestrator.cancel() {
                        compactor_info!("cancellation requested");
                        writeln!(self.out, "Cancelling, waiting for in-flight chunks to be dropped...")?;
                    }
                }
                _ = ticker.tick() => {}
            }

            let state = self.orchestrator.state();
            if state.job_id != Some(job_id) {
                bail!("job {job_id} was cleared before it finished");
            }
            if state.status.is_terminal() {
                return self.finish(state);
            }

            let line = (state.progress_percent, state.status_message.clone());
            if last_rendered.as_ref() != Some(&line) {
                self.render_progress(&state)?;
                last_rendered = Some(line);
            }
        }
    }

    fn render_progress(&mut self, state: &JobState) -> Result<()> {
        writeln!(self.out, "[{:>3}%] {}", state.progress_percent, state.status_message)?;
        Ok(())
    }

    fn finish(&mut self, state: JobState) -> Result<Outcome> {
        let outcome = match (state.status, state.result, state.error) {
            (JobStatus::Completed, Some(artifact), _) => {
                let stats = &artifact.stats;
                writeln!(
                    self.out,
                    "Done: {} -> {} tokens, {} saved ({:.1}% reduction) across {} chunks",
                    stats.original_tokens,
                    stats.compressed_tokens,
                    stats.tokens_saved,
                    stats.ratio,
                    artifact.chunk_count
                )?;
                Outcome::Completed(artifact)
            }
            (JobStatus::Cancelled, _, _) => {
                writeln!(self.out, "Cancelled by user; no output written.")?;
                Outcome::Cancelled
            }
            (JobStatus::Failed, _, Some(error)) => {
                writeln!(self.out, "Failed: {error}")?;
                Outcome::Failed(error)
            }
            (status, _, _) => bail!("job ended as {status:?} without a result"),
        };
        self.orchestrator.clear();
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use compactor_core::{ConversationMetadata, Message, Role};
    use compactor_engine::{CompressionClient, CompressionError, FailureKind};
    use tokio::runtime::Handle;
    use tokio::sync::Semaphore;

    use super::*;

    struct StubClient {
        calls: AtomicUsize,
        fail: bool,
        gate: Option<Arc<Semaphore>>,
    }

    impl StubClient {
        fn new(fail: bool, gate: Option<Arc<Semaphore>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
                gate,
            })
        }
    }

    #[async_trait::async_trait]
    impl CompressionClient for StubClient {
        async fn compress(
            &self,
            _credential: &Credential,
            text: &str,
        ) -> Result<String, CompressionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.fail {
                return Err(CompressionError::new(FailureKind::Timeout, "deadline"));
            }
            Ok(text.split_whitespace().take(2).collect::<Vec<_>>().join(" "))
        }

        async fn verify(&self, _credential: &Credential) -> Result<(), CompressionError> {
            Ok(())
        }
    }

    fn document() -> ConversationDocument {
        ConversationDocument::new(
            ConversationMetadata::default(),
            vec![
                Message::new(Role::User, "how do I pack for a long trip"),
                Message::new(Role::Assistant, "roll clothes and bring fewer shoes"),
            ],
        )
    }

    fn key() -> Option<Credential> {
        Credential::new("sk-test")
    }

    const POLL: Duration = Duration::from_millis(5);

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn completed_job_renders_once_and_clears() {
        compactor_logging::initialize_for_tests();
        let client = StubClient::new(false, None);
        let orchestrator = JobOrchestrator::new(client.clone(), Handle::current());
        let mut observer = ProgressObserver::new(&orchestrator, POLL, Vec::new());

        let outcome = observer
            .run(document(), key(), 5, std::future::pending())
            .await
            .unwrap();

        let artifact = match outcome {
            Outcome::Completed(artifact) => artifact,
            other => panic!("expected completion, got {other:?}"),
        };
        assert_eq!(artifact.message_count, 2);
        assert_eq!(orchestrator.state(), JobState::default());

        let output = String::from_utf8(observer.into_output()).unwrap();
        assert_eq!(output.matches("Done:").count(), 1);
        assert!(output.contains("%] "));
        assert!(!output.contains("[100%]"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn interrupt_cancels_once_and_renders_cancelled() {
        compactor_logging::initialize_for_tests();
        let gate = Arc::new(Semaphore::new(0));
        let client = StubClient::new(false, Some(gate.clone()));
        let orchestrator = JobOrchestrator::new(client, Handle::current());
        let mut observer = ProgressObserver::new(&orchestrator, POLL, Vec::new());

        let interrupt = tokio::time::sleep(Duration::from_millis(30));
        let outcome = observer.run(document(), key(), 5, interrupt).await.unwrap();
        gate.add_permits(100);

        assert!(matches!(outcome, Outcome::Cancelled));
        assert_eq!(orchestrator.state(), JobState::default());
        let output = String::from_utf8(observer.into_output()).unwrap();
        assert_eq!(output.matches("Cancelling").count(), 1);
        assert_eq!(output.matches("Cancelled by user").count(), 1);
        assert!(!output.contains("Failed"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failure_is_rendered_distinctly() {
        compactor_logging::initialize_for_tests();
        let client = StubClient::new(true, None);
        let orchestrator = JobOrchestrator::new(client, Handle::current());
        let mut observer = ProgressObserver::new(&orchestrator, POLL, Vec::new());

        let outcome = observer
            .run(document(), key(), 5000, std::future::pending())
            .await
            .unwrap();

        match outcome {
            Outcome::Failed(JobError::ChunkCompressionFailure { index, .. }) => {
                assert_eq!(index, 0)
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(orchestrator.state(), JobState::default());
        let output = String::from_utf8(observer.into_output()).unwrap();
        assert_eq!(output.matches("Failed:").count(), 1);
        assert!(!output.contains("Cancelled"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn missing_credential_fails_without_calls() {
        compactor_logging::initialize_for_tests();
        let client = StubClient::new(false, None);
        let orchestrator = JobOrchestrator::new(client.clone(), Handle::current());
        let mut observer = ProgressObserver::new(&orchestrator, POLL, Vec::new());

        let outcome = observer
            .run(document(), None, 5000, std::future::pending())
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Failed(JobError::MissingCredential)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn second_job_is_refused_while_one_runs() {
        compactor_logging::initialize_for_tests();
        let gate = Arc::new(Semaphore::new(0));
        let client = StubClient::new(false, Some(gate.clone()));
        let orchestrator = JobOrchestrator::new(client, Handle::current());
        orchestrator.start(document(), key(), 5000).unwrap();
        let before = orchestrator.state();

        let mut observer = ProgressObserver::new(&orchestrator, POLL, Vec::new());
        let err = observer
            .run(document(), key(), 5000, std::future::pending())
            .await
            .unwrap_err();

        assert_eq!(err.downcast_ref::<JobError>(), Some(&JobError::AlreadyRunning));
        assert_eq!(orchestrator.state().job_id, before.job_id);
        assert!(orchestrator.state().is_running());
        gate.add_permits(100);
    }
}
