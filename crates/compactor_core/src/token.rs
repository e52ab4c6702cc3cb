pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> u32;
}

/// Cheap deterministic estimate: every whitespace-delimited word costs
/// `ceil(chars / chars_per_token)` tokens and whitespace costs nothing.
///
/// Because whitespace is free, the estimate is additive across any split on
/// whitespace: the chunk estimates always sum to the estimate of the whole.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioTokenCounter {
    chars_per_token: u32,
}

impl CharRatioTokenCounter {
    pub const DEFAULT_CHARS_PER_TOKEN: u32 = 4;

    pub fn new(chars_per_token: u32) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }

    pub fn count_word(&self, word: &str) -> u32 {
        let chars = word.chars().count() as u32;
        chars.div_ceil(self.chars_per_token)
    }
}

impl Default for CharRatioTokenCounter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenCounter for CharRatioTokenCounter {
    fn count(&self, text: &str) -> u32 {
        text.split_whitespace().map(|w| self.count_word(w)).sum()
    }
}
