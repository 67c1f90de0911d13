//! BM25 keyword searcher.
//!
//! Drives one query end to end: split the text into terms, read and score
//! each term's postings, merge them, rank, truncate and resolve the winners
//! to objects.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use ahash::{AHashMap, AHashSet};
use log::{debug, error};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use uuid::Uuid;

use crate::analysis::{Tokenizer, WhitespaceTokenizer};
use crate::bm25::cancel::CancellationToken;
use crate::bm25::config::Bm25Config;
use crate::bm25::deleted::DeletedDocIdChecker;
use crate::bm25::merger::{MergedResultSet, ScoreMerger};
use crate::bm25::posting::PostingList;
use crate::bm25::query::{KeywordQuery, QueryFilter, SearchHit, SearchResults, TermChecksum};
use crate::bm25::resolver::ObjectResolver;
use crate::bm25::retrieval::{PostingRetriever, RetrievalRequest};
use crate::bm25::scoring::{Bm25Scorer, DocumentLengthProvider, UniformDocumentLength};
use crate::error::{KwrankError, Result, ResultExt};
use crate::object::{JsonObjectDecoder, ObjectDecoder};
use crate::storage::{OBJECTS_BUCKET, Store};

/// BM25 keyword searcher over a store's inverted index.
#[derive(Debug)]
pub struct Bm25Searcher {
    store: Arc<dyn Store>,
    decoder: Arc<dyn ObjectDecoder>,
    tokenizer: Arc<dyn Tokenizer>,
    lengths: Arc<dyn DocumentLengthProvider>,
    deleted: Option<Arc<dyn DeletedDocIdChecker>>,
    config: Bm25Config,
    scorer: Bm25Scorer,
    merger: ScoreMerger,

    /// Present only when per-term work runs in parallel.
    thread_pool: Option<Arc<ThreadPool>>,
}

impl Bm25Searcher {
    /// Create a searcher with JSON object decoding, whitespace tokenization
    /// and uniform document lengths.
    pub fn new(store: Arc<dyn Store>, config: Bm25Config) -> Result<Self> {
        config.validate()?;

        let thread_pool = if config.parallel_terms {
            let size = config.thread_pool_size.unwrap_or_else(num_cpus::get);
            let pool = ThreadPoolBuilder::new()
                .num_threads(size)
                .thread_name(|i| format!("bm25-term-{i}"))
                .build()
                .map_err(|e| KwrankError::internal(format!("Failed to create thread pool: {e}")))?;
            Some(Arc::new(pool))
        } else {
            None
        };

        Ok(Bm25Searcher {
            store,
            decoder: Arc::new(JsonObjectDecoder::new()),
            tokenizer: Arc::new(WhitespaceTokenizer::new()),
            lengths: Arc::new(UniformDocumentLength),
            deleted: None,
            scorer: Bm25Scorer::from_config(&config),
            merger: ScoreMerger::new(),
            config,
            thread_pool,
        })
    }

    /// Use `decoder` to materialize objects.
    pub fn with_decoder(mut self, decoder: Arc<dyn ObjectDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Use `tokenizer` to split query text.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Normalize term frequencies with `lengths`.
    pub fn with_length_provider(mut self, lengths: Arc<dyn DocumentLengthProvider>) -> Self {
        self.lengths = lengths;
        self
    }

    /// Drop documents `checker` reports as deleted.
    pub fn with_deleted_checker(mut self, checker: Arc<dyn DeletedDocIdChecker>) -> Self {
        self.deleted = Some(checker);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &Bm25Config {
        &self.config
    }

    /// Run `query`.
    ///
    /// Any failure aborts the whole call; no partial results are returned. A
    /// panic raised while searching, including on a worker thread, comes
    /// back as [`KwrankError::Internal`].
    pub fn search(&self, query: &KeywordQuery, cancel: &CancellationToken) -> Result<SearchResults> {
        let query_id = Uuid::new_v4();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.search_inner(query_id, query, cancel)
        }));

        match outcome {
            Ok(result) => {
                result.with_context(|| format!("bm25 search on property '{}'", query.property))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("[{query_id}] search panicked: {message}");
                Err(KwrankError::internal(format!("search panicked: {message}")))
            }
        }
    }

    fn search_inner(
        &self,
        query_id: Uuid,
        query: &KeywordQuery,
        cancel: &CancellationToken,
    ) -> Result<SearchResults> {
        query.validate()?;
        let started = Instant::now();

        let terms = self.tokenizer.tokenize(&query.text)?;
        debug!(
            "[{query_id}] '{}' on '{}' split into {} terms by {}",
            query.text,
            query.property,
            terms.len(),
            self.tokenizer.name()
        );
        if terms.is_empty() {
            return Ok(SearchResults::default());
        }

        let total_docs = self
            .store
            .bucket(OBJECTS_BUCKET)
            .ok_or_else(|| KwrankError::missing_bucket(OBJECTS_BUCKET))?
            .count()
            .context("count stored objects")?;

        let lists = self.term_lists(query_id, &query.property, &terms, total_docs, cancel)?;
        let term_checksums = terms
            .iter()
            .zip(&lists)
            .map(|(term, list)| TermChecksum {
                term: term.clone(),
                checksum: list.checksum.clone(),
            })
            .collect();

        let mut merged = self.merger.merge(&lists);
        if let Some(filter) = &query.filter {
            self.apply_filter(query_id, filter, &mut merged, cancel)?;
        }
        if let Some(deleted) = &self.deleted {
            let before = merged.len();
            merged.retain(|doc| !deleted.is_deleted(doc.doc_id));
            debug!("[{query_id}] dropped {} deleted documents", before - merged.len());
        }

        merged.sort_by_score();
        let total_hits = merged.len() as u64;
        merged.truncate(query.limit);

        let docs = merged.into_docs();
        let scores: AHashMap<u64, f64> = docs.iter().map(|d| (d.doc_id, d.score)).collect();
        let doc_ids: Vec<u64> = docs.iter().map(|d| d.doc_id).collect();

        let resolved = ObjectResolver::new(self.store.as_ref(), self.decoder.as_ref())
            .resolve_with_ids(&doc_ids, &query.projection, cancel)
            .context("resolve doc ids to objects")?;

        let hits: Vec<SearchHit> = resolved
            .into_iter()
            .map(|(doc_id, object)| SearchHit {
                score: scores.get(&doc_id).copied().unwrap_or_default(),
                object,
            })
            .collect();
        let max_score = hits.first().map(|h| h.score).unwrap_or(0.0);

        debug!(
            "[{query_id}] {} hits of {total_hits} matches in {:?}",
            hits.len(),
            started.elapsed()
        );

        Ok(SearchResults {
            hits,
            total_hits,
            max_score,
            term_checksums,
        })
    }

    fn term_lists(
        &self,
        query_id: Uuid,
        property: &str,
        terms: &[String],
        total_docs: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<PostingList>> {
        match &self.thread_pool {
            Some(pool) if terms.len() > 1 => pool.install(|| {
                terms
                    .par_iter()
                    .map(|term| self.term_postings(query_id, property, term, total_docs, cancel))
                    .collect()
            }),
            _ => terms
                .iter()
                .map(|term| self.term_postings(query_id, property, term, total_docs, cancel))
                .collect(),
        }
    }

    /// Read, score and sort one term's postings.
    fn term_postings(
        &self,
        query_id: Uuid,
        property: &str,
        term: &str,
        total_docs: u64,
        cancel: &CancellationToken,
    ) -> Result<PostingList> {
        let started = Instant::now();
        let mut list = PostingRetriever::new(self.store.as_ref())
            .term(
                property,
                term,
                self.config.row_limit,
                self.config.tolerate_duplicates,
                cancel,
            )
            .with_context(|| {
                format!(
                    "read doc ids and their frequencies from inverted index for {property}={term}"
                )
            })?;
        debug!(
            "[{query_id}] term '{term}': {} postings read in {:?}",
            list.count,
            started.elapsed()
        );

        self.scorer
            .score(&mut list, property, total_docs, self.lengths.as_ref())
            .with_context(|| format!("score postings for {property}={term}"))?;

        // Rows are not stored sorted yet.
        if !list.is_sorted_by_doc_id() {
            let sort_started = Instant::now();
            list.sort_by_doc_id();
            debug!(
                "[{query_id}] term '{term}': sorted {} postings in {:?}",
                list.len(),
                sort_started.elapsed()
            );
        }

        Ok(list)
    }

    fn apply_filter(
        &self,
        query_id: Uuid,
        filter: &QueryFilter,
        merged: &mut MergedResultSet,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let request = RetrievalRequest::term(&filter.property, &filter.value)
            .with_operator(filter.operator);
        let allowed: AHashSet<u64> = PostingRetriever::new(self.store.as_ref())
            .retrieve(&request, cancel)
            .with_context(|| {
                format!(
                    "read filter {} {} '{}'",
                    filter.property, filter.operator, filter.value
                )
            })?
            .iter()
            .map(|e| e.doc_id)
            .collect();

        let before = merged.len();
        merged.retain(|doc| allowed.contains(&doc.doc_id));
        debug!(
            "[{query_id}] filter kept {} of {before} documents",
            merged.len()
        );
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
