//! Invocation event parsing
//!
//! The host hands over a loosely typed JSON event. Callers behind an API
//! gateway wrap the real parameters in a JSON-encoded `body` string, and
//! console-configured triggers pass nested documents (`objects`,
//! `cosSelectConfig`) as JSON strings. [`Invocation::from_event`] accepts all
//! of these shapes and produces validated [`ObjectDescriptor`]s.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::types::{
    DEFAULT_SELECT_TYPE, Destination, ObjectDescriptor, ObjectLocation, SelectConfig,
};

/// Validated parameters of one invocation
#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    /// Objects to convert, in request order
    pub objects: Vec<ObjectLocation>,
    /// Where output is written (None when `targetBucket` is unset)
    pub destination: Option<Destination>,
    /// Provider select type
    pub select_type: u32,
    /// Select request body shared by every object
    pub select_config: SelectConfig,
    /// `sourceSizeLimit` in bytes (None = unlimited)
    pub source_size_limit: Option<u64>,
    /// `localSizeLimit` in bytes (None = unlimited)
    pub local_size_limit: Option<u64>,
}

impl Invocation {
    /// Parse and validate a raw host event
    ///
    /// All missing required parameters are reported in one error:
    /// `params parsed error, missing params: objects, cosSelectConfig`.
    pub fn from_event(event: Value) -> Result<Self> {
        let params = flatten_event(event)?;

        let target_bucket = string_param(&params, "targetBucket")?;
        let target_region = string_param(&params, "targetRegion")?;

        let mut missing = Vec::new();
        if is_blank(params.get("objects")) {
            missing.push("objects");
        }
        if is_blank(params.get("cosSelectConfig")) {
            missing.push("cosSelectConfig");
        }
        if target_bucket.is_some() && target_region.is_none() {
            missing.push("targetRegion");
        }
        if !missing.is_empty() {
            return Err(Error::InvalidEvent(format!(
                "params parsed error, missing params: {}",
                missing.join(", ")
            )));
        }

        let objects: Vec<ObjectLocation> = json_param(&params, "objects")
            .map_err(|_| {
                Error::InvalidEvent(
                    "objects must be a JSON array of {bucket, region, key}".to_string(),
                )
            })?;
        let select_config: SelectConfig = json_param(&params, "cosSelectConfig")
            .map_err(|e| Error::InvalidEvent(format!("cosSelectConfig is invalid: {e}")))?;

        let destination = match (target_bucket, target_region) {
            (Some(bucket), Some(region)) => Some(Destination {
                bucket,
                region,
                prefix: string_param(&params, "targetPrefix")?.unwrap_or_default(),
                name_format: string_param(&params, "targetNameFormat")?.unwrap_or_default(),
            }),
            _ => None,
        };

        let select_type = match integer_param(&params, "selectType")? {
            Some(value) => u32::try_from(value).map_err(|_| {
                Error::InvalidEvent(format!("selectType {value} is out of range"))
            })?,
            None => DEFAULT_SELECT_TYPE,
        };

        Ok(Self {
            objects,
            destination,
            select_type,
            select_config,
            source_size_limit: size_limit(&params, "sourceSizeLimit")?,
            local_size_limit: size_limit(&params, "localSizeLimit")?,
        })
    }

    /// One descriptor per object, in request order
    pub fn descriptors(&self) -> Vec<ObjectDescriptor> {
        self.objects
            .iter()
            .map(|source| ObjectDescriptor {
                source: source.clone(),
                destination: self.destination.clone(),
                select_type: self.select_type,
                select_config: self.select_config.clone(),
                source_size_limit: self.source_size_limit,
                local_size_limit: self.local_size_limit,
            })
            .collect()
    }
}

/// Merge a JSON-encoded `body` over the top-level event
fn flatten_event(event: Value) -> Result<Map<String, Value>> {
    let Value::Object(mut params) = event else {
        return Err(Error::InvalidEvent("event must be a JSON object".to_string()));
    };

    if let Some(Value::String(body)) = params.get("body")
        && !body.trim().is_empty()
    {
        let body: Value = serde_json::from_str(body)
            .map_err(|e| Error::InvalidEvent(format!("body is not valid JSON: {e}")))?;
        params.remove("body");
        if let Value::Object(fields) = body {
            params.extend(fields);
        } else {
            return Err(Error::InvalidEvent("body must be a JSON object".to_string()));
        }
    }

    Ok(params)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// A non-empty string parameter
fn string_param(params: &Map<String, Value>, name: &str) -> Result<Option<String>> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::InvalidEvent(format!(
            "{name} must be a string, got {other}"
        ))),
    }
}

/// A document parameter, given inline or as a JSON-encoded string
fn json_param<T: serde::de::DeserializeOwned>(
    params: &Map<String, Value>,
    name: &str,
) -> std::result::Result<T, serde_json::Error> {
    match params.get(name) {
        Some(Value::String(encoded)) => serde_json::from_str(encoded),
        Some(value) => serde_json::from_value(value.clone()),
        None => serde_json::from_value(Value::Null),
    }
}

/// An integer parameter, given as a number or a numeric string
fn integer_param(params: &Map<String, Value>, name: &str) -> Result<Option<u64>> {
    let invalid = || Error::InvalidEvent(format!("{name} must be a non-negative integer"));
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(invalid),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// A byte limit; zero means unlimited
fn size_limit(params: &Map<String, Value>, name: &str) -> Result<Option<u64>> {
    Ok(integer_param(params, name)?.filter(|limit| *limit > 0))
}
