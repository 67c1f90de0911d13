//! Resolving document ids to stored objects.

use log::trace;

use crate::bm25::cancel::CancellationToken;
use crate::error::{KwrankError, Result, ResultExt};
use crate::object::{ObjectDecoder, Projection, StoredObject};
use crate::storage::{DOC_ID_SECONDARY_INDEX, OBJECTS_BUCKET, Store, doc_id_key};

/// Materializes objects through the objects bucket's doc id index.
#[derive(Debug, Clone, Copy)]
pub struct ObjectResolver<'s> {
    store: &'s dyn Store,
    decoder: &'s dyn ObjectDecoder,
}

impl<'s> ObjectResolver<'s> {
    /// Create a resolver reading from `store` and decoding with `decoder`.
    pub fn new(store: &'s dyn Store, decoder: &'s dyn ObjectDecoder) -> Self {
        ObjectResolver { store, decoder }
    }

    /// Resolve `doc_ids` in order.
    ///
    /// Ids without a live object are left out. A found record that fails to
    /// decode fails the whole call.
    pub fn resolve(
        &self,
        doc_ids: &[u64],
        projection: &Projection,
        cancel: &CancellationToken,
    ) -> Result<Vec<StoredObject>> {
        let resolved = self.resolve_with_ids(doc_ids, projection, cancel)?;
        Ok(resolved.into_iter().map(|(_, object)| object).collect())
    }

    /// Like [`ObjectResolver::resolve`], pairing each object with the id it
    /// was found under.
    pub fn resolve_with_ids(
        &self,
        doc_ids: &[u64],
        projection: &Projection,
        cancel: &CancellationToken,
    ) -> Result<Vec<(u64, StoredObject)>> {
        let bucket = self
            .store
            .bucket(OBJECTS_BUCKET)
            .ok_or_else(|| KwrankError::missing_bucket(OBJECTS_BUCKET))?;

        let mut objects = Vec::with_capacity(doc_ids.len());
        for (position, doc_id) in doc_ids.iter().enumerate() {
            cancel.check()?;

            let raw = bucket
                .get_by_secondary(DOC_ID_SECONDARY_INDEX, &doc_id_key(*doc_id))
                .with_context(|| format!("get object for doc id {doc_id}"))?;
            let Some(raw) = raw else {
                trace!("doc id {doc_id} has no live object, skipping");
                continue;
            };

            let object = self.decoder.decode(&raw, projection).map_err(|e| {
                KwrankError::decode(
                    format!("position {position} (doc id {doc_id})"),
                    e.to_string(),
                )
            })?;
            objects.push((*doc_id, object));
        }

        Ok(objects)
    }
}
