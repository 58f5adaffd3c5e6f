//! Traits and types for object storage access

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::TransportError;
use crate::types::{ObjectLocation, SelectConfig};

/// Streamed select output, one chunk per provider record batch
pub type SelectStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// Metadata returned by a HEAD request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object size in bytes
    pub content_length: u64,
}

/// One select query against one object
#[derive(Debug, Clone, PartialEq)]
pub struct SelectRequest {
    /// Object to query
    pub location: ObjectLocation,
    /// Provider select type (2 = SQL)
    pub select_type: u32,
    /// Request body
    pub config: SelectConfig,
}

/// Storage operations a conversion task consumes
///
/// Implementations must be cheap to share: one client is used by every task
/// of an invocation through an `Arc`. All methods take `&self`; tasks never
/// write to the same key, so no write coordination is required.
///
/// Dropping a returned future or stream must abandon the underlying request;
/// that is how in-flight work is aborted when the deadline passes.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Fetch object metadata without downloading the body
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotFound`] if the object does not exist, or any
    /// other transport failure.
    async fn head_object(&self, location: &ObjectLocation) -> Result<ObjectMeta, TransportError>;

    /// Run a select query and return its output as a stream
    ///
    /// The stream is consumed incrementally so callers can stop reading as soon
    /// as a size limit is crossed.
    async fn select_object(&self, request: &SelectRequest) -> Result<SelectStream, TransportError>;

    /// Write a whole object
    async fn put_object(
        &self,
        location: &ObjectLocation,
        body: Vec<u8>,
    ) -> Result<(), TransportError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
