//! Compactor core: conversation model, chunking and the pure job state machine.
mod assemble;
mod chunk;
mod conversation;
mod effect;
mod error;
mod msg;
mod state;
mod token;
mod update;

pub use assemble::{reassemble, ChunkResult, Reassembled, CHUNK_SEPARATOR};
pub use chunk::{split, Chunk, Chunker, PARAGRAPH_SEPARATOR};
pub use conversation::{ConversationDocument, ConversationMetadata, Message, Role};
pub use effect::Effect;
pub use error::JobError;
pub use msg::Msg;
pub use state::{progress, Artifact, JobId, JobState, JobStatus, TokenStats};
pub use token::{CharRatioTokenCounter, TokenCounter};
pub use update::update;
