//! Keyword query and result types.

use serde::{Deserialize, Serialize};

use crate::error::{KwrankError, Result};
use crate::object::{Projection, StoredObject};
use crate::storage::Operator;

/// A BM25 keyword search request against one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordQuery {
    /// Raw query text, split into terms by the searcher's tokenizer.
    pub text: String,

    /// Indexed property to search.
    pub property: String,

    /// Maximum number of hits.
    pub limit: usize,

    /// Restrict hits to documents matching this filter.
    #[serde(default)]
    pub filter: Option<QueryFilter>,

    /// Object properties to materialize.
    #[serde(default)]
    pub projection: Projection,
}

impl KeywordQuery {
    /// Create a query with a limit of 10, no filter and a full projection.
    pub fn new<T: Into<String>, P: Into<String>>(text: T, property: P) -> Self {
        KeywordQuery {
            text: text.into(),
            property: property.into(),
            limit: 10,
            filter: None,
            projection: Projection::all(),
        }
    }

    /// Set the maximum number of hits.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the projection.
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Check the query can be executed.
    pub fn validate(&self) -> Result<()> {
        if self.property.is_empty() {
            return Err(KwrankError::invalid_query("property must not be empty"));
        }
        if let Some(filter) = &self.filter {
            if filter.property.is_empty() {
                return Err(KwrankError::invalid_query(
                    "filter property must not be empty",
                ));
            }
        }
        Ok(())
    }
}

/// A single-property condition over indexed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    /// Indexed property the condition reads.
    pub property: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Value compared against the property's index rows.
    pub value: String,
}

impl QueryFilter {
    /// Create a new filter.
    pub fn new<P: Into<String>, V: Into<String>>(property: P, operator: Operator, value: V) -> Self {
        QueryFilter {
            property: property.into(),
            operator,
            value: value.into(),
        }
    }
}

/// A ranked object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// The resolved object.
    pub object: StoredObject,
    /// The BM25 score summed over query terms.
    pub score: f64,
}

/// Checksum of one term's retrieval pass, usable as a cache validity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermChecksum {
    pub term: String,
    pub checksum: Vec<u8>,
}

/// Search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Hits by descending score.
    pub hits: Vec<SearchHit>,
    /// Number of distinct documents that matched before truncation.
    pub total_hits: u64,
    /// Maximum score in the results.
    pub max_score: f64,
    /// One checksum per query term, in term order.
    pub term_checksums: Vec<TermChecksum>,
}

impl SearchResults {
    /// Check if there are no hits.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Document ids of the hits, in rank order.
    pub fn doc_ids(&self) -> Vec<u64> {
        self.hits.iter().map(|h| h.object.doc_id).collect()
    }
}
