//! Object storage collaborator
//!
//! The provider SDK is treated as an opaque external collaborator. This module
//! defines the small surface the conversion tasks need from it, so that the
//! runner can be driven by a real SDK binding in production and by an
//! in-memory store in tests.
//!
//! ## Architecture
//!
//! - [`ObjectStorage`]: `head_object`, `select_object` (streamed output) and
//!   `put_object`
//! - [`InMemoryStorage`]: map-backed implementation with failure and latency
//!   injection
//!
//! ## Usage
//!
//! ```
//! use cos_select::storage::{InMemoryStorage, ObjectStorage};
//! use cos_select::types::ObjectLocation;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = InMemoryStorage::new();
//! let location = ObjectLocation::new("b1", "ap-guangzhou", "a.csv");
//! storage.insert(&location, b"id,name\n1,a\n".to_vec());
//!
//! let meta = storage.head_object(&location).await?;
//! assert_eq!(meta.content_length, 12);
//! # Ok(())
//! # }
//! ```

mod memory;
mod traits;

pub use memory::InMemoryStorage;
pub use traits::{ObjectMeta, ObjectStorage, SelectRequest, SelectStream};
