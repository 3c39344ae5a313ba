use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUrlParts<'a> {
    pub mime_type: Option<&'a str>,
    pub payload: &'a str,
}

pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
}

/// Splits `data:<mime>;base64,<payload>` into its parts.
///
/// Anything after the first comma is the payload; a string with no comma is
/// treated as a bare base64 payload.
pub fn split_data_url(raw: &str) -> DataUrlParts<'_> {
    let Some((head, payload)) = raw.split_once(',') else {
        return DataUrlParts {
            mime_type: None,
            payload: raw,
        };
    };
    let mime_type = head
        .strip_prefix("data:")
        .map(|rest| rest.split(';').next().unwrap_or(rest).trim())
        .filter(|mime| !mime.is_empty());
    DataUrlParts { mime_type, payload }
}

pub fn decode_data_url(raw: &str) -> Result<Vec<u8>> {
    let parts = split_data_url(raw);
    if parts.payload.trim().is_empty() {
        bail!("data url carries an empty payload");
    }
    BASE64
        .decode(parts.payload.trim().as_bytes())
        .context("data url base64 decode failed")
}
