use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use compactor_core::CharRatioTokenCounter;
use compactor_engine::{
    export_artifact, export_transcript, AnthropicClient, ArtifactWriter, CompressionClient,
    JobOrchestrator,
};
use compactor_logging::{compactor_info, compactor_warn};
use tokio::runtime::Handle;

use crate::config::{CompactorSettings, API_KEY_ENV};
use crate::observer::{Outcome, ProgressObserver};
use crate::source::load_conversation;

/// `(generated_at, filename_timestamp)` for an export made now.
fn export_times() -> (String, String) {
    let now = Local::now();
    (
        now.format("%Y-%m-%d %H:%M:%S").to_string(),
        now.format("%Y-%m-%d_%H-%M-%S").to_string(),
    )
}

pub async fn run_compress(
    settings: &CompactorSettings,
    input: &Path,
    cli_key: Option<&str>,
) -> Result<()> {
    let document = load_conversation(input)?;
    let client = AnthropicClient::new(settings.client_settings())
        .context("building HTTP client")?;
    let orchestrator = JobOrchestrator::with_settings(
        Arc::new(client),
        Handle::current(),
        settings.orchestrator_settings(),
        Arc::new(CharRatioTokenCounter::default()),
    );

    println!(
        "Compressing {} messages from {} (chunk budget {} tokens)",
        document.message_count(),
        input.display(),
        settings.chunk_size_tokens
    );
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            compactor_warn!("cannot listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    let mut observer = ProgressObserver::new(&orchestrator, settings.poll_interval(), io::stdout());
    let outcome = observer
        .run(
            document,
            settings.credential(cli_key),
            settings.chunk_size_tokens,
            interrupt,
        )
        .await?;

    match outcome {
        Outcome::Completed(artifact) => {
            let (generated_at, stamp) = export_times();
            let writer = ArtifactWriter::new(&settings.output_dir);
            let summary = export_artifact(&writer, &artifact, &generated_at, &stamp)
                .context("writing compressed conversation")?;
            compactor_info!(
                "wrote {} bytes to {:?}",
                summary.bytes_written,
                summary.path
            );
            println!("Saved {}", summary.path.display());
            Ok(())
        }
        Outcome::Cancelled => Ok(()),
        Outcome::Failed(error) => {
            if matches!(error, compactor_core::JobError::MissingCredential) {
                bail!("{error}; pass --api-key or set {API_KEY_ENV}");
            }
            Err(error.into())
        }
    }
}

pub fn run_extract(settings: &CompactorSettings, input: &Path) -> Result<()> {
    let document = load_conversation(input)?;
    if document.is_empty() {
        bail!("{} contains no messages", input.display());
    }
    let (generated_at, stamp) = export_times();
    let writer = ArtifactWriter::new(&settings.output_dir);
    let summary = export_transcript(&writer, &document, &generated_at, &stamp)
        .context("writing transcript")?;
    compactor_info!(
        "wrote transcript of {} messages to {:?}",
        document.message_count(),
        summary.path
    );
    println!("Saved {}", summary.path.display());
    Ok(())
}

pub async fn run_verify(settings: &CompactorSettings, cli_key: Option<&str>) -> Result<()> {
    let Some(credential) = settings.credential(cli_key) else {
        bail!("no API key; pass --api-key or set {API_KEY_ENV}");
    };
    let client = AnthropicClient::new(settings.client_settings())
        .context("building HTTP client")?;
    client
        .verify(&credential)
        .await
        .with_context(|| format!("API key rejected by {}", settings.api.endpoint))?;
    println!("API key accepted ({})", settings.api.model);
    Ok(())
}
