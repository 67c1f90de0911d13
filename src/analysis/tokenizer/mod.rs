//! Tokenizer implementations for query text.

use std::fmt;

use crate::error::Result;

/// Trait for tokenizers that convert query text into index terms.
pub trait Tokenizer: Send + Sync + fmt::Debug {
    /// Split `text` into terms, in query order.
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;

    /// Get the name of this tokenizer (for debugging and configuration).
    fn name(&self) -> &'static str;
}

pub mod whitespace;

pub use whitespace::WhitespaceTokenizer;
