//! Byte sources for the tools that work on uploaded files (checksums, images).
//!
//! The full-content read is the only await point in those operations: once the
//! buffer is materialized everything else runs synchronously.
use futures::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::ToolError;

/// Reads `source` to the end. Any read failure (e.g. a file handle revoked by
/// the browser mid-read) surfaces as [`ToolError::Io`] and no partial buffer is returned.
pub async fn read_all<R>(mut source: R) -> Result<Vec<u8>, ToolError>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes).await?;
    debug!(bytes = bytes.len(), "byte source materialized");
    Ok(bytes)
}
