use std::fmt::Write as _;
use std::path::PathBuf;

use compactor_core::{Artifact, ConversationDocument, ConversationMetadata};

use crate::filename::artifact_filename;
use crate::persist::{ArtifactWriter, PersistError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub bytes_written: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Renders a completed artifact as a markdown document with a stats header.
pub fn build_compressed_document(artifact: &Artifact, generated_at: &str) -> String {
    let stats = &artifact.stats;
    let mut doc = String::new();
    let _ = writeln!(
        doc,
        "# Compressed Conversation: {}\n",
        display_title(&artifact.source)
    );
    write_source_lines(&mut doc, &artifact.source);
    let _ = writeln!(doc, "**Generated:** {generated_at}");
    let _ = writeln!(doc, "**Original messages:** {}", artifact.message_count);
    let _ = writeln!(doc, "**Chunks:** {}", artifact.chunk_count);
    let _ = writeln!(doc, "**Original tokens:** {}", stats.original_tokens);
    let _ = writeln!(doc, "**Compressed tokens:** {}", stats.compressed_tokens);
    let _ = writeln!(doc, "**Tokens saved:** {}", stats.tokens_saved);
    let _ = writeln!(doc, "**Reduction:** {:.1}%", stats.ratio);
    let _ = writeln!(doc, "**Method:** {}", artifact.method);
    doc.push_str("\n---\n\n");
    doc.push_str(artifact.combined_text.trim_end());
    doc.push('\n');
    doc
}

/// Renders the uncompressed conversation, one section per message.
pub fn build_transcript_document(document: &ConversationDocument, generated_at: &str) -> String {
    let mut doc = String::new();
    let _ = writeln!(doc, "# {}\n", display_title(&document.metadata));
    write_source_lines(&mut doc, &document.metadata);
    let _ = writeln!(doc, "**Generated:** {generated_at}");
    let _ = writeln!(doc, "**Messages:** {}", document.message_count());
    doc.push_str("\n---\n\n");

    let last = document.messages.len().saturating_sub(1);
    for (i, message) in document.messages.iter().enumerate() {
        let _ = write!(
            doc,
            "## {}\n\n{}\n\n",
            message.role.label(),
            message.content.trim()
        );
        if i < last {
            doc.push_str("---\n\n");
        }
    }
    doc
}

/// Writes the compressed artifact under a timestamped name.
pub fn export_artifact(
    writer: &ArtifactWriter,
    artifact: &Artifact,
    generated_at: &str,
    timestamp: &str,
) -> Result<ExportSummary, ExportError> {
    let content = build_compressed_document(artifact, generated_at);
    let name = artifact_filename(
        "compressed",
        &artifact.source.title,
        &artifact.source.source_url,
        timestamp,
    );
    write(writer, &name, &content)
}

/// Writes the plain transcript under a timestamped name.
pub fn export_transcript(
    writer: &ArtifactWriter,
    document: &ConversationDocument,
    generated_at: &str,
    timestamp: &str,
) -> Result<ExportSummary, ExportError> {
    let content = build_transcript_document(document, generated_at);
    let name = artifact_filename(
        "transcript",
        &document.metadata.title,
        &document.metadata.source_url,
        timestamp,
    );
    write(writer, &name, &content)
}

fn write(writer: &ArtifactWriter, name: &str, content: &str) -> Result<ExportSummary, ExportError> {
    let path = writer.write(name, content)?;
    Ok(ExportSummary {
        path,
        bytes_written: content.len(),
    })
}

fn display_title(meta: &ConversationMetadata) -> &str {
    let title = meta.title.trim();
    if title.is_empty() {
        "Untitled"
    } else {
        title
    }
}

fn write_source_lines(doc: &mut String, meta: &ConversationMetadata) {
    if !meta.source_url.is_empty() {
        let _ = writeln!(doc, "**Source:** {}", meta.source_url);
    }
    if !meta.extracted_at.is_empty() {
        let _ = writeln!(doc, "**Extracted:** {}", meta.extracted_at);
    }
}
