//! Opaque pagination cursors
//!
//! A cursor is the base64 form of a decimal offset. Clients must treat
//! it as opaque; anything undecodable resumes from the start.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

use trending_core::CursorError;

pub fn encode_cursor(offset: usize) -> String {
    STANDARD.encode(offset.to_string())
}

pub fn decode_cursor(cursor: &str) -> Result<usize, CursorError> {
    let bytes = STANDARD
        .decode(cursor.trim())
        .map_err(|e| CursorError::Encoding(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| CursorError::Offset(e.to_string()))?;

    text.trim()
        .parse::<usize>()
        .map_err(|_| CursorError::Offset(text))
}

/// Start offset for an optional cursor, 0 when absent or malformed
pub fn offset_or_zero(cursor: Option<&str>) -> usize {
    match cursor {
        None => 0,
        Some(c) if c.trim().is_empty() => 0,
        Some(c) => decode_cursor(c).unwrap_or_else(|e| {
            debug!("Ignoring malformed cursor {:?}: {}", c, e);
            0
        }),
    }
}
