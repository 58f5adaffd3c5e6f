//! In-memory object storage for tests and local runs

use super::traits::{ObjectMeta, ObjectStorage, SelectRequest, SelectStream};
use crate::error::TransportError;
use crate::types::ObjectLocation;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Map-backed [`ObjectStorage`]
///
/// A select against this store returns the stored bytes unchanged, split into
/// chunks (the equivalent of `Select * from COSObject`). Failures and latency
/// can be injected per source key, which is what the runner tests use to
/// simulate transport errors and slow in-flight requests.
///
/// # Examples
///
/// ```
/// use cos_select::error::TransportError;
/// use cos_select::storage::InMemoryStorage;
///
/// let storage = InMemoryStorage::new();
/// storage.fail_select("b.csv", TransportError::Network("connection reset".into()));
/// assert_eq!(storage.select_calls(), 0);
/// ```
pub struct InMemoryStorage {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<(String, String), Vec<u8>>,
    select_failures_once: HashMap<String, VecDeque<TransportError>>,
    select_failures: HashMap<String, TransportError>,
    put_failures: HashMap<String, TransportError>,
    select_delays: HashMap<String, Duration>,
    chunk_size: usize,
    head_calls: usize,
    select_calls: usize,
    selects_finished: usize,
    put_calls: usize,
    selected_keys: Vec<String>,
}

impl InMemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                chunk_size: DEFAULT_CHUNK_SIZE,
                ..Default::default()
            }),
        }
    }

    /// Split select output into chunks of `chunk_size` bytes (minimum 1)
    pub fn with_chunk_size(self, chunk_size: usize) -> Self {
        self.lock().chunk_size = chunk_size.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an object
    pub fn insert(&self, location: &ObjectLocation, body: Vec<u8>) {
        self.lock()
            .objects
            .insert((location.bucket.clone(), location.key.clone()), body);
    }

    /// Read back a stored object (including ones written by tasks)
    pub fn object(&self, location: &ObjectLocation) -> Option<Vec<u8>> {
        self.lock()
            .objects
            .get(&(location.bucket.clone(), location.key.clone()))
            .cloned()
    }

    /// Make every select against `key` fail with `error`
    pub fn fail_select(&self, key: impl Into<String>, error: TransportError) {
        self.lock().select_failures.insert(key.into(), error);
    }

    /// Make the next `times` selects against `key` fail with `error`
    pub fn fail_select_times(&self, key: impl Into<String>, times: usize, error: TransportError) {
        let mut inner = self.lock();
        let queue = inner.select_failures_once.entry(key.into()).or_default();
        queue.extend(std::iter::repeat_n(error, times));
    }

    /// Make every write to destination `key` fail with `error`
    pub fn fail_put(&self, key: impl Into<String>, error: TransportError) {
        self.lock().put_failures.insert(key.into(), error);
    }

    /// Delay selects against `key` before any output is produced
    pub fn delay_select(&self, key: impl Into<String>, delay: Duration) {
        self.lock().select_delays.insert(key.into(), delay);
    }

    /// Number of HEAD requests served
    pub fn head_calls(&self) -> usize {
        self.lock().head_calls
    }

    /// Number of select requests started
    pub fn select_calls(&self) -> usize {
        self.lock().select_calls
    }

    /// Number of select requests that got past their injected delay
    pub fn selects_finished(&self) -> usize {
        self.lock().selects_finished
    }

    /// Number of write requests served
    pub fn put_calls(&self) -> usize {
        self.lock().put_calls
    }

    /// Source keys in the order selects were started
    pub fn selected_keys(&self) -> Vec<String> {
        self.lock().selected_keys.clone()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(location: &ObjectLocation) -> TransportError {
    TransportError::NotFound {
        bucket: location.bucket.clone(),
        key: location.key.clone(),
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn head_object(&self, location: &ObjectLocation) -> Result<ObjectMeta, TransportError> {
        let mut inner = self.lock();
        inner.head_calls += 1;
        inner
            .objects
            .get(&(location.bucket.clone(), location.key.clone()))
            .map(|body| ObjectMeta {
                content_length: body.len() as u64,
            })
            .ok_or_else(|| not_found(location))
    }

    async fn select_object(&self, request: &SelectRequest) -> Result<SelectStream, TransportError> {
        let key = &request.location.key;
        let delay = {
            let mut inner = self.lock();
            inner.select_calls += 1;
            inner.selected_keys.push(key.clone());

            if let Some(err) = inner
                .select_failures_once
                .get_mut(key)
                .and_then(VecDeque::pop_front)
            {
                return Err(err);
            }
            if let Some(err) = inner.select_failures.get(key) {
                return Err(err.clone());
            }
            inner.select_delays.get(key).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        inner.selects_finished += 1;
        let chunk_size = inner.chunk_size;
        let body = inner
            .objects
            .get(&(request.location.bucket.clone(), key.clone()))
            .ok_or_else(|| not_found(&request.location))?;

        let chunks: Vec<Result<Vec<u8>, TransportError>> = body
            .chunks(chunk_size)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn put_object(
        &self,
        location: &ObjectLocation,
        body: Vec<u8>,
    ) -> Result<(), TransportError> {
        let mut inner = self.lock();
        inner.put_calls += 1;
        if let Some(err) = inner.put_failures.get(&location.key) {
            return Err(err.clone());
        }
        inner
            .objects
            .insert((location.bucket.clone(), location.key.clone()), body);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SelectConfig;

    fn request(key: &str) -> SelectRequest {
        SelectRequest {
            location: ObjectLocation::new("b1", "ap-guangzhou", key),
            select_type: 2,
            config: SelectConfig {
                expression: "Select * from COSObject".into(),
                expression_type: "SQL".into(),
                input_serialization: serde_json::Value::Null,
                output_serialization: serde_json::Value::Null,
                request_progress: None,
            },
        }
    }

    #[tokio::test]
    async fn select_streams_stored_bytes_in_chunks() {
        let storage = InMemoryStorage::new().with_chunk_size(4);
        let req = request("a.csv");
        storage.insert(&req.location, b"0123456789".to_vec());

        let chunks: Vec<Vec<u8>> = storage
            .select_object(&req)
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(
            chunks,
            vec![b"0123".to_vec(), b"4567".to_vec(), b"89".to_vec()]
        );
        assert_eq!(storage.select_calls(), 1);
        assert_eq!(storage.selects_finished(), 1);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let storage = InMemoryStorage::new();

        let err = storage.select_object(&request("nope.csv")).await.err().unwrap();

        assert!(matches!(err, TransportError::NotFound { ref key, .. } if key == "nope.csv"));
    }

    #[tokio::test]
    async fn one_shot_failures_are_consumed_before_permanent_behavior() {
        let storage = InMemoryStorage::new();
        let req = request("a.csv");
        storage.insert(&req.location, b"x".to_vec());
        storage.fail_select_times("a.csv", 1, TransportError::Timeout("slow".into()));

        assert!(storage.select_object(&req).await.is_err());
        assert!(storage.select_object(&req).await.is_ok());
        assert_eq!(storage.selected_keys(), vec!["a.csv", "a.csv"]);
    }

    #[tokio::test]
    async fn put_failure_leaves_object_unwritten() {
        let storage = InMemoryStorage::new();
        let target = ObjectLocation::new("out", "ap-guangzhou", "x.json");
        storage.fail_put("x.json", TransportError::AccessDenied("read-only".into()));

        assert!(storage.put_object(&target, b"{}".to_vec()).await.is_err());
        assert!(storage.object(&target).is_none());
        assert_eq!(storage.put_calls(), 1);
    }
}
