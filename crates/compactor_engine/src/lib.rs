//! Compactor engine: compression client, job orchestration and export IO.
mod client;
mod export;
mod filename;
mod orchestrator;
mod persist;
mod store;
mod types;

pub use client::{AnthropicClient, ClientSettings, CompressionClient};
pub use export::{
    build_compressed_document, build_transcript_document, export_artifact, export_transcript,
    ExportError, ExportSummary,
};
pub use filename::artifact_filename;
pub use orchestrator::{JobOrchestrator, OrchestratorSettings};
pub use persist::{ensure_output_dir, ArtifactWriter, PersistError};
pub use store::JobStateStore;
pub use types::{CompressionError, Credential, FailureKind};
