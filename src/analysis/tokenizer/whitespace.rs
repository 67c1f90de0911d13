//! Whitespace tokenizer implementation.

use super::Tokenizer;

use crate::error::Result;

/// A tokenizer that splits text on whitespace.
///
/// Terms are kept verbatim (no case folding), so they must match the index
/// keys byte for byte. Runs of whitespace never produce empty terms.
#[derive(Clone, Debug, Default)]
pub struct WhitespaceTokenizer;

impl WhitespaceTokenizer {
    /// Create a new whitespace tokenizer.
    pub fn new() -> Self {
        WhitespaceTokenizer
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        Ok(text.split_whitespace().map(str::to_string).collect())
    }

    fn name(&self) -> &'static str {
        "whitespace"
    }
}
