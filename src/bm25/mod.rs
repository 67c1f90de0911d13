//! BM25 keyword search over an inverted index.
//!
//! Each indexed property owns a bucket of posting rows keyed by term. A
//! query reads one row per term ([`retrieval`]), scores its postings
//! ([`scoring`]), merges the terms with OR semantics ([`merger`]) and
//! resolves the best documents to objects ([`resolver`]). [`Bm25Searcher`]
//! ties the steps together.

pub mod cancel;
pub mod checksum;
pub mod config;
pub mod deleted;
pub mod merger;
pub mod posting;
pub mod query;
pub mod resolver;
pub mod retrieval;
pub mod scoring;
pub mod searcher;

pub use cancel::CancellationToken;
pub use checksum::{combine_checksums, row_hash};
pub use config::Bm25Config;
pub use deleted::{DeletedDocIdChecker, DeletedDocIds};
pub use merger::{MergedResultSet, ScoreMerger, ScoredDoc};
pub use posting::{PostingEntry, PostingList, decode_row};
pub use query::{KeywordQuery, QueryFilter, SearchHit, SearchResults, TermChecksum};
pub use resolver::ObjectResolver;
pub use retrieval::{PostingRetriever, RetrievalRequest};
pub use scoring::{
    Bm25Scorer, DocumentLengthProvider, MemoryDocumentLengths, UniformDocumentLength, idf,
    saturated_tf,
};
pub use searcher::Bm25Searcher;
