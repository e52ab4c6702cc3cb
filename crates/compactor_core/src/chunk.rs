use serde::{Deserialize, Serialize};

use crate::token::TokenCounter;

/// Separator placed between packed paragraphs inside one chunk.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub estimated_tokens: u32,
}

/// Splits text into ordered chunks whose estimate stays within a token budget.
///
/// Paragraphs (runs of lines separated by blank lines) are packed greedily.
/// A paragraph that alone exceeds the budget is split on whitespace instead;
/// a single word larger than the budget becomes its own chunk. Splitting
/// never fails, and whitespace-only input produces no chunks.
pub struct Chunker<'a> {
    counter: &'a dyn TokenCounter,
    max_tokens: u32,
}

impl<'a> Chunker<'a> {
    pub fn new(counter: &'a dyn TokenCounter, max_tokens_per_chunk: u32) -> Self {
        Self {
            counter,
            max_tokens: max_tokens_per_chunk.max(1),
        }
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let mut out = ChunkAccumulator::default();

        for paragraph in paragraphs(text) {
            let tokens = self.counter.count(&paragraph);
            if tokens > self.max_tokens {
                out.flush();
                self.split_words(&paragraph, &mut out);
                out.flush();
                continue;
            }
            if out.tokens + tokens > self.max_tokens {
                out.flush();
            }
            out.push(&paragraph, tokens, PARAGRAPH_SEPARATOR);
        }

        out.flush();
        out.chunks
    }

    fn split_words(&self, paragraph: &str, out: &mut ChunkAccumulator) {
        for word in paragraph.split_whitespace() {
            let tokens = self.counter.count(word);
            if out.tokens + tokens > self.max_tokens {
                out.flush();
            }
            out.push(word, tokens, " ");
        }
    }
}

/// Convenience wrapper around [`Chunker::split`].
pub fn split(text: &str, max_tokens_per_chunk: u32, counter: &dyn TokenCounter) -> Vec<Chunk> {
    Chunker::new(counter, max_tokens_per_chunk).split(text)
}

#[derive(Default)]
struct ChunkAccumulator {
    chunks: Vec<Chunk>,
    current: String,
    tokens: u32,
}

impl ChunkAccumulator {
    fn push(&mut self, piece: &str, tokens: u32, separator: &str) {
        if !self.current.is_empty() {
            self.current.push_str(separator);
        }
        self.current.push_str(piece);
        self.tokens += tokens;
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let index = self.chunks.len();
        self.chunks.push(Chunk {
            index,
            text: std::mem::take(&mut self.current),
            estimated_tokens: self.tokens,
        });
        self.tokens = 0;
    }
}

fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !lines.is_empty() {
                out.push(lines.join("\n"));
                lines.clear();
            }
        } else {
            lines.push(line.trim_end());
        }
    }
    if !lines.is_empty() {
        out.push(lines.join("\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::CharRatioTokenCounter;

    fn words_of(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    #[test]
    fn small_input_yields_single_chunk() {
        let counter = CharRatioTokenCounter::default();
        let chunks = split("one\n\ntwo", 100, &counter);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "one\n\ntwo");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn whitespace_only_input_yields_nothing() {
        let counter = CharRatioTokenCounter::default();
        assert!(split("  \n\n \t\n", 10, &counter).is_empty());
    }

    #[test]
    fn paragraphs_are_packed_up_to_the_budget() {
        let counter = CharRatioTokenCounter::default();
        // Each paragraph is 3 tokens.
        let text = "aaaa bbbb cccc\n\ndddd eeee ffff\n\ngggg hhhh iiii";
        let chunks = split(text, 6, &counter);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "aaaa bbbb cccc\n\ndddd eeee ffff");
        assert_eq!(chunks[1].text, "gggg hhhh iiii");
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn oversized_word_stands_alone() {
        let counter = CharRatioTokenCounter::default();
        let giant = "x".repeat(40);
        let text = format!("tiny {giant} tail");
        let chunks = split(&text, 3, &counter);
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["tiny", giant.as_str(), "tail"]);
        assert_eq!(chunks[1].estimated_tokens, 10);
    }

    #[test]
    fn zero_budget_is_treated_as_one() {
        let counter = CharRatioTokenCounter::default();
        let chunks = split("ab cd", 0, &counter);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn rejoining_chunks_reconstructs_words_and_token_sum() {
        let counter = CharRatioTokenCounter::default();
        let text = "User: first question here\nwith a second line\n\n\n\
                    Assistant: a long answer that keeps going and going for quite a while \
                    before it finally stops\n\nUser: thanks";
        for budget in [1, 2, 3, 5, 8, 13, 100] {
            let chunks = split(text, budget, &counter);
            let rejoined = chunks
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(PARAGRAPH_SEPARATOR);
            assert_eq!(words_of(&rejoined), words_of(text), "budget {budget}");
            let sum: u32 = chunks.iter().map(|c| c.estimated_tokens).sum();
            assert_eq!(sum, counter.count(text), "budget {budget}");
            for chunk in &chunks {
                assert!(
                    chunk.estimated_tokens <= budget || words_of(&chunk.text).len() == 1,
                    "chunk {chunk:?} over budget {budget}"
                );
            }
            for (i, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.index, i);
            }
        }
    }
}
