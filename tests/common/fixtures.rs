//! Storage, descriptor and event fixtures

use cos_select::{
    DEFAULT_NAME_FORMAT, Destination, InMemoryStorage, ObjectDescriptor, ObjectLocation,
    RetryConfig, RunnerConfig, SelectConfig,
};
use serde_json::{Value, json};
use std::sync::Arc;

/// Source bucket used by every fixture
pub const SOURCE_BUCKET: &str = "logs-1250000000";
/// Region used by every fixture
pub const REGION: &str = "ap-guangzhou";
/// Destination bucket used by fixtures that write output
pub const TARGET_BUCKET: &str = "selected-1250000000";

/// CSV body stored for every seeded key
pub const CSV_BODY: &[u8] = b"id,name\n1,alpha\n2,beta\n";

/// Location of `key` in the source bucket
pub fn source(key: &str) -> ObjectLocation {
    ObjectLocation::new(SOURCE_BUCKET, REGION, key)
}

/// Storage pre-seeded with [`CSV_BODY`] under each key
pub fn seeded_storage(keys: &[&str]) -> Arc<InMemoryStorage> {
    let storage = InMemoryStorage::new();
    for key in keys {
        storage.insert(&source(key), CSV_BODY.to_vec());
    }
    Arc::new(storage)
}

/// The select request used by every fixture
pub fn select_config_json() -> Value {
    json!({
        "Expression": "Select * from COSObject",
        "ExpressionType": "SQL",
        "InputSerialization": {"CSV": {"FileHeaderInfo": "USE"}},
        "OutputSerialization": {"JSON": {"RecordDelimiter": "\n"}},
    })
}

/// Typed form of [`select_config_json`]
pub fn select_config() -> SelectConfig {
    serde_json::from_value(select_config_json()).unwrap_or_else(|e| panic!("fixture: {e}"))
}

/// Descriptor for `key` with no destination and no limits
pub fn descriptor(key: &str) -> ObjectDescriptor {
    ObjectDescriptor {
        source: source(key),
        destination: None,
        select_type: 2,
        select_config: select_config(),
        source_size_limit: None,
        local_size_limit: None,
    }
}

/// Descriptor for `key` writing to [`TARGET_BUCKET`] under `prefix`
pub fn descriptor_to(key: &str, prefix: &str) -> ObjectDescriptor {
    ObjectDescriptor {
        destination: Some(Destination {
            bucket: TARGET_BUCKET.to_string(),
            region: REGION.to_string(),
            prefix: prefix.to_string(),
            name_format: DEFAULT_NAME_FORMAT.to_string(),
        }),
        ..descriptor(key)
    }
}

/// Host event for `keys` in the source bucket
pub fn event_for(keys: &[&str]) -> Value {
    let objects: Vec<Value> = keys
        .iter()
        .map(|key| json!({"bucket": SOURCE_BUCKET, "region": REGION, "key": key}))
        .collect();
    json!({
        "objects": objects,
        "cosSelectConfig": select_config_json(),
    })
}

/// Runner config without retry backoff, so failures resolve immediately
pub fn fast_config() -> RunnerConfig {
    RunnerConfig {
        retry: RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        },
        ..RunnerConfig::default()
    }
}
