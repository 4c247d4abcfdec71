use log::warn;

use super::types::Response;
use crate::error::{Error, ErrorCode};

/// Reads and parses a response body as JSON, at most once.
///
/// Fails with `0031` when the body was already read, and with `0030` when
/// it is not JSON; the latter keeps the raw text in [`Error::text`].
pub fn safe_stream_json(response: &Response) -> Result<serde_json::Value, Error> {
    if response.body_used() {
        return Err(Error::new(ErrorCode::StreamUsed).with_xhr(response.clone()));
    }

    let text = response.text();
    serde_json::from_str(&text).map_err(|e| {
        warn!("Response body is not JSON: {e}");
        Error::new(ErrorCode::InvalidJson)
            .with_text(text)
            .with_xhr(response.clone())
    })
}
