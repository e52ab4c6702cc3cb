use crate::JobError;

/// Visible separator between compressed chunks in the combined document.
pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Outcome of compressing one chunk. Exactly one exists per chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResult {
    Compressed {
        index: usize,
        original_tokens: u32,
        compressed_tokens: u32,
        compressed_text: String,
    },
    Failed {
        index: usize,
        error: String,
    },
}

impl ChunkResult {
    pub fn index(&self) -> usize {
        match self {
            ChunkResult::Compressed { index, .. } | ChunkResult::Failed { index, .. } => *index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    pub combined_text: String,
    pub original_tokens: u64,
    pub compressed_tokens: u64,
    pub chunk_count: usize,
}

/// Orders results by chunk index and joins them. Completion order never
/// affects the output. Any failed chunk fails the whole reassembly.
pub fn reassemble(mut results: Vec<ChunkResult>) -> Result<Reassembled, JobError> {
    results.sort_by_key(ChunkResult::index);

    let mut texts = Vec::with_capacity(results.len());
    let mut original_tokens = 0u64;
    let mut compressed_tokens = 0u64;
    for result in &results {
        match result {
            ChunkResult::Compressed {
                original_tokens: o,
                compressed_tokens: c,
                compressed_text,
                ..
            } => {
                original_tokens += u64::from(*o);
                compressed_tokens += u64::from(*c);
                texts.push(compressed_text.trim());
            }
            ChunkResult::Failed { index, error } => {
                return Err(JobError::ChunkCompressionFailure {
                    index: *index,
                    message: error.clone(),
                });
            }
        }
    }

    Ok(Reassembled {
        combined_text: texts.join(CHUNK_SEPARATOR),
        original_tokens,
        compressed_tokens,
        chunk_count: results.len(),
    })
}
