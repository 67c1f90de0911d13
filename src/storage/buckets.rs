//! Bucket naming conventions.
//!
//! Each indexed property owns an inverted-index bucket and a hash shadow
//! bucket keyed identically. Objects live in one bucket whose secondary
//! index 0 is keyed by the little-endian document id.

/// Name of the bucket holding the stored objects.
pub const OBJECTS_BUCKET: &str = "objects";

/// Secondary index position of the document id on the objects bucket.
pub const DOC_ID_SECONDARY_INDEX: usize = 0;

/// Name of the inverted-index bucket for `property`.
pub fn property_bucket(property: &str) -> String {
    format!("property_{property}")
}

/// Name of the row-hash bucket shadowing the index bucket of `property`.
pub fn hash_bucket(property: &str) -> String {
    format!("hash_property_{property}")
}

/// Canonical secondary key of a document id.
pub fn doc_id_key(doc_id: u64) -> [u8; 8] {
    doc_id.to_le_bytes()
}
