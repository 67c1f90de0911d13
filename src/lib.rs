//! # kwrank
//!
//! BM25 keyword search over an inverted index kept in an ordered key-value
//! store.
//!
//! ## Features
//!
//! - Posting retrieval with per-row hashes folded into cache checksums
//! - BM25 scoring with pluggable document length normalization
//! - OR merge of multi-term queries with additive scores
//! - Object resolution through the store's doc id index
//! - Cancellation and deadlines checked per row and per object
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use kwrank::bm25::{Bm25Config, Bm25Searcher, CancellationToken, KeywordQuery};
//! use kwrank::ingest::CorpusLoader;
//! use kwrank::storage::MemoryStore;
//!
//! let mut loader = CorpusLoader::new(Arc::new(MemoryStore::new()));
//! loader
//!     .load_jsonl("{\"title\":\"black cat\"}\n{\"title\":\"white dog\"}\n".as_bytes())
//!     .unwrap();
//!
//! let searcher = Bm25Searcher::new(loader.store(), Bm25Config::default()).unwrap();
//! let results = searcher
//!     .search(&KeywordQuery::new("cat", "title"), &CancellationToken::new())
//!     .unwrap();
//! assert_eq!(results.doc_ids(), vec![1]);
//! ```

pub mod analysis;
pub mod bm25;
pub mod cli;
pub mod error;
pub mod ingest;
pub mod object;
pub mod storage;
