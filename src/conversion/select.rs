//! Size-bounded collection of select output

use futures::StreamExt;

use crate::error::{SizeLimitKind, TaskError};
use crate::storage::SelectStream;

/// Drain a select stream into memory, stopping as soon as `limit` is crossed
///
/// The stream is dropped on the first oversized chunk or transport error, so
/// nothing past the limit is read from the provider.
pub(super) async fn collect_limited(
    mut stream: SelectStream,
    limit: Option<u64>,
) -> Result<Vec<u8>, TaskError> {
    let mut buffer = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let total = (buffer.len() + chunk.len()) as u64;
        if let Some(limit) = limit
            && total > limit
        {
            return Err(TaskError::SizeLimitExceeded {
                kind: SizeLimitKind::Local,
                limit,
                actual: total,
            });
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer)
}
