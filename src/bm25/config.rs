//! Configuration for BM25 keyword search.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KwrankError, Result};

/// Configuration for the BM25 searcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Config {
    /// K1 parameter for BM25 (term frequency saturation).
    pub k1: f64,

    /// B parameter for BM25 (document length normalization).
    pub b: f64,

    /// Whether duplicate postings inside one term's list are left for the
    /// merger to collapse. When false, retrieval removes them itself.
    pub tolerate_duplicates: bool,

    /// Run per-term retrieval and scoring on the searcher's thread pool.
    pub parallel_terms: bool,

    /// Thread pool size for parallel terms.
    /// If None, uses the number of CPU cores.
    pub thread_pool_size: Option<usize>,

    /// Stop a term's scan once this many postings were read (0 = no cutoff).
    /// The cutoff applies per row, so a list may end up longer.
    pub row_limit: usize,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Bm25Config {
            k1: 1.2,
            b: 0.75,
            tolerate_duplicates: true,
            parallel_terms: false,
            thread_pool_size: None,
            row_limit: 0,
        }
    }
}

impl Bm25Config {
    /// Set the K1 parameter.
    pub fn with_k1(mut self, k1: f64) -> Self {
        self.k1 = k1;
        self
    }

    /// Set the B parameter.
    pub fn with_b(mut self, b: f64) -> Self {
        self.b = b;
        self
    }

    /// Enable or disable parallel per-term retrieval.
    pub fn with_parallel_terms(mut self, parallel: bool) -> Self {
        self.parallel_terms = parallel;
        self
    }

    /// Set the thread pool size used for parallel terms.
    pub fn with_thread_pool_size(mut self, size: usize) -> Self {
        self.thread_pool_size = Some(size);
        self
    }

    /// Set whether duplicate postings are tolerated.
    pub fn with_tolerate_duplicates(mut self, tolerate: bool) -> Self {
        self.tolerate_duplicates = tolerate;
        self
    }

    /// Set the per-term posting cutoff.
    pub fn with_row_limit(mut self, limit: usize) -> Self {
        self.row_limit = limit;
        self
    }

    /// Check that every parameter is in range.
    pub fn validate(&self) -> Result<()> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(KwrankError::invalid_config(format!(
                "k1 must be a finite non-negative number, got {}",
                self.k1
            )));
        }
        if !self.b.is_finite() || !(0.0..=1.0).contains(&self.b) {
            return Err(KwrankError::invalid_config(format!(
                "b must be within [0, 1], got {}",
                self.b
            )));
        }
        if self.thread_pool_size == Some(0) {
            return Err(KwrankError::invalid_config(
                "thread_pool_size must be at least 1",
            ));
        }
        Ok(())
    }

    /// Load and validate a configuration from a JSON file.
    ///
    /// Missing fields take their default value.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Bm25Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}
