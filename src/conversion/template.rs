//! Destination key templates

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::types::ObjectLocation;

/// Template used when the event leaves `targetNameFormat` empty
pub const DEFAULT_NAME_FORMAT: &str = "${Key}";

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"\$\{([A-Za-z]+)\}").expect("placeholder pattern is valid")
    })
}

/// Build the destination key for `source` from `prefix` and `name_format`
///
/// Supported placeholders:
/// - `${Bucket}`, `${Region}`, `${Key}` - the source location
/// - `${Name}` - last path segment of the key without its extension
/// - `${Ext}` - extension of the last path segment, without the dot
///
/// Unknown placeholders are left as written.
pub fn render_destination_key(prefix: &str, name_format: &str, source: &ObjectLocation) -> String {
    let format = if name_format.is_empty() {
        DEFAULT_NAME_FORMAT
    } else {
        name_format
    };

    let file_name = source.key.rsplit('/').next().unwrap_or_default();
    let (name, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (file_name, ""),
    };

    let rendered = placeholder_pattern().replace_all(format, |caps: &Captures<'_>| {
        match &caps[1] {
            "Bucket" => source.bucket.clone(),
            "Region" => source.region.clone(),
            "Key" => source.key.clone(),
            "Name" => name.to_string(),
            "Ext" => ext.to_string(),
            _ => caps[0].to_string(),
        }
    });

    format!("{prefix}{rendered}")
}
