//! Transfer encoding used by the mail API for attachment payloads.
//!
//! Payloads arrive as URL-safe base64. Servers are inconsistent about
//! padding, so both padded and unpadded input is accepted.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::error::{GrabError, Result};
use crate::model::attachment::EncodedBytes;

/// Decode an API payload into raw bytes.
pub fn decode_transfer(encoded: &EncodedBytes) -> Result<Vec<u8>> {
    let compact: String = encoded
        .as_str()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    URL_SAFE_NO_PAD
        .decode(compact.trim_end_matches('=').as_bytes())
        .map_err(|e| GrabError::decode("attachment payload", e))
}

/// Encode raw bytes the way the API does (padded URL-safe base64).
pub fn encode_transfer(data: &[u8]) -> EncodedBytes {
    EncodedBytes(URL_SAFE.encode(data))
}
