//! Posting retrieval from the inverted index.

use log::{debug, trace, warn};

use crate::bm25::cancel::CancellationToken;
use crate::bm25::checksum::combine_checksums;
use crate::bm25::posting::{PostingList, decode_row};
use crate::error::{KwrankError, Result, ResultExt};
use crate::storage::{Operator, RowReader, Store, hash_bucket, property_bucket};

/// What to read from one property's index.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalRequest<'r> {
    /// Indexed property.
    pub property: &'r str,
    /// Value compared against row keys.
    pub value: &'r [u8],
    /// Comparison operator.
    pub operator: Operator,
    /// Stop after the row that brings the posting count to this value
    /// (0 = read every matching row).
    pub limit: usize,
    /// Leave duplicate postings in the list.
    pub tolerate_duplicates: bool,
}

impl<'r> RetrievalRequest<'r> {
    /// Equality lookup of `term` on `property`.
    pub fn term(property: &'r str, term: &'r str) -> Self {
        RetrievalRequest {
            property,
            value: term.as_bytes(),
            operator: Operator::Equal,
            limit: 0,
            tolerate_duplicates: true,
        }
    }

    /// Set the comparison operator.
    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    /// Set the posting cutoff.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set whether duplicates are left in the list.
    pub fn with_tolerate_duplicates(mut self, tolerate: bool) -> Self {
        self.tolerate_duplicates = tolerate;
        self
    }
}

/// Reads posting lists and their checksums from a store.
#[derive(Debug, Clone, Copy)]
pub struct PostingRetriever<'s> {
    store: &'s dyn Store,
}

impl<'s> PostingRetriever<'s> {
    /// Create a retriever over `store`.
    pub fn new(store: &'s dyn Store) -> Self {
        PostingRetriever { store }
    }

    /// Read the postings of every row matching the request.
    ///
    /// Entries come back in read order. The property's hash bucket must
    /// exist; its absence fails the call before any row is read.
    pub fn retrieve(
        &self,
        request: &RetrievalRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<PostingList> {
        let bucket_name = property_bucket(request.property);
        let bucket = self
            .store
            .bucket(&bucket_name)
            .ok_or_else(|| KwrankError::missing_bucket(&bucket_name))?;
        let hashes_bucket = self
            .store
            .bucket(&hash_bucket(request.property))
            .ok_or_else(|| KwrankError::missing_hash_bucket(request.property))?;

        let mut list = PostingList::new();
        let mut hashes: Vec<Vec<u8>> = Vec::new();

        RowReader::new(bucket.as_ref(), request.value, request.operator)
            .read(&mut |key, pairs| {
                cancel.check()?;

                let entries = decode_row(key, pairs)?;
                trace!(
                    "row '{}' of '{}': {} postings",
                    String::from_utf8_lossy(key),
                    bucket_name,
                    entries.len()
                );
                list.extend_from_row(entries);

                // The row's own key, not the request value: range and like
                // operators match rows other than the value itself.
                let hash = hashes_bucket
                    .get(key)
                    .with_context(|| format!("get hash of row '{}'", String::from_utf8_lossy(key)))?;
                match hash {
                    Some(hash) => hashes.push(hash),
                    None => {
                        warn!(
                            "no row hash for '{}' in property '{}'",
                            String::from_utf8_lossy(key),
                            request.property
                        );
                        hashes.push(Vec::new());
                    }
                }

                if request.limit > 0 && list.count >= request.limit as u64 {
                    return Ok(false);
                }
                Ok(true)
            })
            .with_context(|| format!("read rows of '{bucket_name}'"))?;

        list.checksum = combine_checksums(&hashes, request.operator);

        if !request.tolerate_duplicates {
            let dropped = list.remove_duplicates();
            if dropped > 0 {
                debug!(
                    "dropped {dropped} duplicate postings for {} {} '{}'",
                    request.property,
                    request.operator,
                    String::from_utf8_lossy(request.value)
                );
            }
        }

        Ok(list)
    }

    /// Equality lookup of one term, as used by keyword ranking.
    pub fn term(
        &self,
        property: &str,
        term: &str,
        limit: usize,
        tolerate_duplicates: bool,
        cancel: &CancellationToken,
    ) -> Result<PostingList> {
        let request = RetrievalRequest::term(property, term)
            .with_limit(limit)
            .with_tolerate_duplicates(tolerate_duplicates);
        self.retrieve(&request, cancel)
    }
}
