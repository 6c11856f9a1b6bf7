//! Opaque offset cursors for paginated listings.

use crate::error::{Result, ServiceError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct CursorPayload {
    offset: i64,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct PaginationMeta {
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    pub limit: i64,
}

impl PaginationMeta {
    /// Builds cursors for a page starting at `offset` that returned `fetched` rows.
    pub fn for_page(offset: i64, limit: i64, fetched: usize) -> Self {
        let next_cursor = (fetched as i64 >= limit).then(|| encode_cursor(offset + limit));
        let prev_cursor = (offset > 0).then(|| encode_cursor(offset.saturating_sub(limit)));
        Self {
            next_cursor,
            prev_cursor,
            limit,
        }
    }
}

pub fn decode_cursor(cursor: &str) -> Result<i64> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| ServiceError::InvalidRequest("invalid cursor".into()))?;
    let payload: CursorPayload = serde_json::from_slice(&bytes)
        .map_err(|_| ServiceError::InvalidRequest("invalid cursor payload".into()))?;
    Ok(payload.offset.max(0))
}

pub fn encode_cursor(offset: i64) -> String {
    let payload = CursorPayload {
        offset: offset.max(0),
    };
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap_or_default())
}
