use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use compactor_core::ConversationDocument;
use compactor_logging::compactor_info;

/// Reads a conversation exported by the page extractor
/// (`{"metadata": {...}, "messages": [...]}`).
pub fn load_conversation(path: &Path) -> Result<ConversationDocument> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading conversation from {}", path.display()))?;
    let document: ConversationDocument = serde_json::from_str(&content)
        .with_context(|| format!("parsing conversation JSON in {}", path.display()))?;
    compactor_info!(
        "loaded {} messages from {:?} ({})",
        document.message_count(),
        path,
        document.metadata.title
    );
    Ok(document)
}
