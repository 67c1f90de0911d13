//! Query text analysis.
//!
//! Splitting query text into terms is a placeholder: the [`Tokenizer`] seam
//! lets a real analyzer replace the [`WhitespaceTokenizer`] without touching
//! the ranking core.

pub mod tokenizer;

// Re-export commonly used types
pub use tokenizer::*;
