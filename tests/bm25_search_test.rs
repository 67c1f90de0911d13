use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use kwrank::bm25::{
    Bm25Config, Bm25Searcher, CancellationToken, DocumentLengthProvider, KeywordQuery,
    PostingEntry, PostingRetriever, RetrievalRequest, row_hash,
};
use kwrank::error::{ErrorKind, KwrankError, Result};
use kwrank::ingest::CorpusLoader;
use kwrank::object::{JsonObjectDecoder, ObjectDecoder, Projection, StoredObject};
use kwrank::storage::{
    Bucket, MapPair, MemoryStore, OBJECTS_BUCKET, Operator, RowVisitor, Store, doc_id_key,
    hash_bucket, property_bucket,
};
use serde_json::json;

const EPS: f64 = 1e-4;

fn put_objects(store: &MemoryStore, ids: impl IntoIterator<Item = u64>) {
    let objects = store.create_bucket(OBJECTS_BUCKET);
    for id in ids {
        let object = StoredObject::new(format!("obj-{id}"), id)
            .with_property("rank", json!(id));
        let raw = JsonObjectDecoder::encode(&object).unwrap();
        objects.put_with_secondary(object.id.as_bytes(), &[&doc_id_key(id)[..]], raw);
    }
}

fn put_row(store: &MemoryStore, property: &str, term: &str, postings: &[(u64, f64)]) {
    let pairs: Vec<MapPair> = postings
        .iter()
        .map(|(id, f)| PostingEntry::new(*id, *f).to_pair())
        .collect();
    store
        .create_bucket(&hash_bucket(property))
        .put(term.as_bytes(), row_hash(&pairs));
    store
        .create_bucket(&property_bucket(property))
        .put_map_raw(term.as_bytes(), pairs);
}

/// Ten objects; "cat" in docs {1: 2, 3: 1}, "dog" in docs {3: 1, 5: 1}.
fn cat_dog_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    put_objects(&store, 1..=10);
    put_row(&store, "title", "cat", &[(1, 2.0), (3, 1.0)]);
    put_row(&store, "title", "dog", &[(5, 1.0), (3, 1.0)]);
    put_row(&store, "title", "car", &[(7, 1.0)]);
    store
}

fn search(store: Arc<MemoryStore>, query: &KeywordQuery) -> Result<kwrank::bm25::SearchResults> {
    Bm25Searcher::new(store, Bm25Config::default())?.search(query, &CancellationToken::new())
}

#[test]
fn test_multi_term_merge_and_rank() {
    let results = search(cat_dog_store(), &KeywordQuery::new("cat dog", "title")).unwrap();

    assert_eq!(results.doc_ids(), vec![3, 1, 5]);
    let scores: Vec<f64> = results.hits.iter().map(|h| h.score).collect();
    assert!((scores[0] - 1.3470).abs() < EPS);
    assert!((scores[1] - 0.9260).abs() < EPS);
    assert!((scores[2] - 0.6735).abs() < EPS);
    assert_eq!(results.hits[0].object.id, "obj-3");
}

#[test]
fn test_truncation_keeps_best() {
    let store = Arc::new(MemoryStore::new());
    put_objects(&store, 1..=50);
    let postings: Vec<(u64, f64)> = (1..=50).map(|id| (id, id as f64)).collect();
    put_row(&store, "body", "term", &postings);

    let results = search(store, &KeywordQuery::new("term", "body").with_limit(5)).unwrap();
    assert_eq!(results.hits.len(), 5);
    assert_eq!(results.total_hits, 50);
    assert_eq!(results.doc_ids(), vec![50, 49, 48, 47, 46]);
}

#[test]
fn test_posting_count_and_checksum() {
    let store = cat_dog_store();
    let retriever = PostingRetriever::new(store.as_ref());
    let cancel = CancellationToken::new();

    let first = retriever.term("title", "cat", 0, true, &cancel).unwrap();
    assert_eq!(first.count, 2);
    assert_eq!(first.count as usize, first.len());

    let again = retriever.term("title", "cat", 0, true, &cancel).unwrap();
    assert_eq!(first.checksum, again.checksum);

    put_row(&store, "title", "cat", &[(1, 2.0), (3, 4.0)]);
    let changed = retriever.term("title", "cat", 0, true, &cancel).unwrap();
    assert_ne!(first.checksum, changed.checksum);
}

#[test]
fn test_like_operator() {
    let store = cat_dog_store();
    let retriever = PostingRetriever::new(store.as_ref());
    let request = RetrievalRequest::term("title", "ca*").with_operator(Operator::Like);

    let first = retriever.retrieve(&request, &CancellationToken::new()).unwrap();
    let mut ids = first.doc_ids();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 3, 7]);
    assert_eq!(first.count, 3);

    let second = retriever.retrieve(&request, &CancellationToken::new()).unwrap();
    assert_eq!(first.checksum, second.checksum);
}

#[test]
fn test_tombstoned_documents_are_skipped() {
    let store = cat_dog_store();
    store.memory_bucket(OBJECTS_BUCKET).unwrap().delete(b"obj-3");

    let results = search(store, &KeywordQuery::new("cat dog", "title")).unwrap();
    assert_eq!(results.doc_ids(), vec![1, 5]);
    assert_eq!(results.total_hits, 3);
}

#[test]
fn test_corrupt_object_fails_query() {
    let store = cat_dog_store();
    store.memory_bucket(OBJECTS_BUCKET).unwrap().put_with_secondary(
        b"obj-3",
        &[&doc_id_key(3)[..]],
        b"\xff\xfe".to_vec(),
    );

    let err = search(store, &KeywordQuery::new("cat dog", "title")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert!(err.to_string().contains("position 0"));
}

#[test]
fn test_missing_hash_bucket_fails_query() {
    let store = cat_dog_store();
    store.drop_bucket(&hash_bucket("title"));

    let err = search(store, &KeywordQuery::new("cat", "title")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingHashBucket);
    assert!(err.to_string().contains("cat"));
}

#[test]
fn test_cancellation_and_deadline() {
    let searcher = Bm25Searcher::new(cat_dog_store(), Bm25Config::default()).unwrap();
    let query = KeywordQuery::new("cat dog", "title");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = searcher.search(&query, &cancel).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.kind(), ErrorKind::Cancelled);

    let expired = CancellationToken::with_timeout(Duration::ZERO);
    let err = searcher.search(&query, &expired).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TimedOut);
    assert!(err.is_retryable());
}

#[test]
fn test_equal_scores_order_by_doc_id() {
    let store = Arc::new(MemoryStore::new());
    put_objects(&store, 1..=10);
    put_row(&store, "title", "tie", &[(9, 1.0), (4, 1.0), (7, 1.0)]);

    let results = search(store, &KeywordQuery::new("tie", "title")).unwrap();
    assert_eq!(results.doc_ids(), vec![4, 7, 9]);
}

#[test]
fn test_length_normalization_changes_ranking() {
    let mut loader = CorpusLoader::new(Arc::new(MemoryStore::new()));
    loader
        .load_jsonl(Cursor::new(
            "{\"title\":\"a b c d e cat\"}\n{\"title\":\"cat\"}\n{\"title\":\"emu\"}\n",
        ))
        .unwrap();
    let query = KeywordQuery::new("cat", "title");

    let uniform = Bm25Searcher::new(loader.store(), Bm25Config::default()).unwrap();
    let results = uniform.search(&query, &CancellationToken::new()).unwrap();
    assert_eq!(results.doc_ids(), vec![1, 2]);
    assert_eq!(results.hits[0].score, results.hits[1].score);

    let normalized = Bm25Searcher::new(loader.store(), Bm25Config::default())
        .unwrap()
        .with_length_provider(loader.lengths());
    let results = normalized.search(&query, &CancellationToken::new()).unwrap();
    assert_eq!(results.doc_ids(), vec![2, 1]);
    assert!(results.hits[0].score > results.hits[1].score);
}

#[test]
fn test_projection_limits_properties() {
    let store = cat_dog_store();
    let query = KeywordQuery::new("cat", "title").with_projection(Projection::only(["missing"]));
    let results = search(store, &query).unwrap();
    assert!(results.hits.iter().all(|h| h.object.properties.is_empty()));
}

#[derive(Debug)]
struct FailingBucket {
    inner: Arc<dyn Bucket>,
}

impl Bucket for FailingBucket {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn get_by_secondary(&self, pos: usize, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get_by_secondary(pos, key)
    }

    fn map_list(&self, _key: &[u8]) -> Result<Vec<MapPair>> {
        Err(KwrankError::store_read(self.name(), "disk unavailable"))
    }

    fn scan_map(&self, _from: Option<&[u8]>, _visit: &mut RowVisitor<'_>) -> Result<()> {
        Err(KwrankError::store_read(self.name(), "disk unavailable"))
    }

    fn count(&self) -> Result<u64> {
        self.inner.count()
    }
}

#[derive(Debug)]
struct FailingStore {
    inner: Arc<MemoryStore>,
    failing: String,
}

impl Store for FailingStore {
    fn bucket(&self, name: &str) -> Option<Arc<dyn Bucket>> {
        let bucket = self.inner.bucket(name)?;
        if name == self.failing {
            Some(Arc::new(FailingBucket { inner: bucket }))
        } else {
            Some(bucket)
        }
    }
}

#[test]
fn test_store_read_failure_carries_context() {
    let store = Arc::new(FailingStore {
        inner: cat_dog_store(),
        failing: property_bucket("title"),
    });

    let err = Bm25Searcher::new(store, Bm25Config::default())
        .unwrap()
        .search(&KeywordQuery::new("dog", "title"), &CancellationToken::new())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreRead);
    assert!(err.is_retryable());
    let message = err.to_string();
    assert!(message.contains("title=dog"));
    assert!(message.contains("disk unavailable"));
}

#[derive(Debug)]
struct PanickingDecoder;

impl ObjectDecoder for PanickingDecoder {
    fn decode(&self, _raw: &[u8], _projection: &Projection) -> Result<StoredObject> {
        panic!("decoder exploded");
    }
}

#[derive(Debug)]
struct PanickingLengths;

impl DocumentLengthProvider for PanickingLengths {
    fn doc_length(&self, _property: &str, _doc_id: u64) -> Result<f64> {
        panic!("length table gone");
    }

    fn average_length(&self, _property: &str) -> Result<f64> {
        Ok(1.0)
    }
}

#[test]
fn test_panics_become_internal_errors() {
    let searcher = Bm25Searcher::new(cat_dog_store(), Bm25Config::default())
        .unwrap()
        .with_decoder(Arc::new(PanickingDecoder));
    let err = searcher
        .search(&KeywordQuery::new("cat", "title"), &CancellationToken::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("decoder exploded"));

    let parallel = Bm25Searcher::new(
        cat_dog_store(),
        Bm25Config::default()
            .with_parallel_terms(true)
            .with_thread_pool_size(2),
    )
    .unwrap()
    .with_length_provider(Arc::new(PanickingLengths));
    let err = parallel
        .search(&KeywordQuery::new("cat dog", "title"), &CancellationToken::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

/// Cancels a token once it has served `after` rows.
#[derive(Debug)]
struct CancellingBucket {
    inner: Arc<dyn Bucket>,
    cancel: CancellationToken,
    served: AtomicUsize,
    after: usize,
}

impl CancellingBucket {
    fn served_row(&self) {
        if self.served.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
            self.cancel.cancel();
        }
    }
}

impl Bucket for CancellingBucket {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn get_by_secondary(&self, pos: usize, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get_by_secondary(pos, key)
    }

    fn map_list(&self, key: &[u8]) -> Result<Vec<MapPair>> {
        let pairs = self.inner.map_list(key)?;
        self.served_row();
        Ok(pairs)
    }

    fn scan_map(&self, from: Option<&[u8]>, visit: &mut RowVisitor<'_>) -> Result<()> {
        self.inner.scan_map(from, &mut |key, pairs| {
            let more = visit(key, pairs)?;
            self.served_row();
            Ok(more)
        })
    }

    fn count(&self) -> Result<u64> {
        self.inner.count()
    }
}

#[derive(Debug)]
struct CancellingStore {
    inner: Arc<MemoryStore>,
    index: Arc<CancellingBucket>,
}

impl CancellingStore {
    fn new(
        inner: Arc<MemoryStore>,
        property: &str,
        cancel: &CancellationToken,
        after: usize,
    ) -> Self {
        let index = Arc::new(CancellingBucket {
            inner: inner.bucket(&property_bucket(property)).unwrap(),
            cancel: cancel.clone(),
            served: AtomicUsize::new(0),
            after,
        });
        CancellingStore { inner, index }
    }
}

impl Store for CancellingStore {
    fn bucket(&self, name: &str) -> Option<Arc<dyn Bucket>> {
        if name == self.index.name() {
            Some(Arc::clone(&self.index) as Arc<dyn Bucket>)
        } else {
            self.inner.bucket(name)
        }
    }
}

#[test]
fn test_cancel_during_row_scan() {
    let cancel = CancellationToken::new();
    let store = CancellingStore::new(cat_dog_store(), "title", &cancel, 1);
    let request = RetrievalRequest::term("title", "*").with_operator(Operator::Like);

    match PostingRetriever::new(&store).retrieve(&request, &cancel) {
        Err(err) => assert!(err.is_cancelled()),
        Ok(list) => panic!("expected cancellation, got {} postings", list.len()),
    }
}

#[test]
fn test_cancel_between_query_terms() {
    let cancel = CancellationToken::new();
    let store = Arc::new(CancellingStore::new(cat_dog_store(), "title", &cancel, 2));
    let searcher = Bm25Searcher::new(store, Bm25Config::default()).unwrap();

    match searcher.search(&KeywordQuery::new("cat dog", "title"), &cancel) {
        Err(err) => {
            assert!(err.is_cancelled());
            assert_eq!(err.kind(), ErrorKind::Cancelled);
        }
        Ok(results) => panic!("expected cancellation, got {} hits", results.hits.len()),
    }
}

#[test]
fn test_reloaded_external_id_is_found_once() {
    let mut loader = CorpusLoader::new(Arc::new(MemoryStore::new()));
    loader
        .load_jsonl(Cursor::new(
            "{\"id\":\"a\",\"title\":\"cat\"}\n{\"id\":\"a\",\"title\":\"cat dog\"}\n",
        ))
        .unwrap();

    let results = search(loader.store(), &KeywordQuery::new("cat", "title")).unwrap();
    assert_eq!(results.doc_ids(), vec![2]);
    assert_eq!(results.total_hits, 1);
    assert_eq!(results.hits[0].object.id, "a");
}
