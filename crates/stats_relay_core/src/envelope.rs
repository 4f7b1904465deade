use std::fmt;
use std::io::Read;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::Value;

/// Marker the memory API prepends to base64-encoded, gzip-compressed values.
const GZ_PREFIX: &str = "gz:";

/// Failure modes of [`decode_memory_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The API envelope reported a failure (`ok != 1`).
    Api(String),
    /// The envelope was well-formed but the requested path holds no value.
    EmptyPath,
    /// The body was not a memory envelope at all.
    Malformed(String),
    /// The value carried the `gz:` marker but did not decode.
    Encoding(String),
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(message) => write!(f, "memory API reported an error: {message}"),
            Self::EmptyPath => write!(f, "memory path holds no value"),
            Self::Malformed(message) => write!(f, "{message}"),
            Self::Encoding(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for EnvelopeError {}

/// The `{ "ok": .., "data": .., "error": .. }` wrapper the memory API puts
/// around every response.
#[derive(Debug, Deserialize)]
struct MemoryEnvelope {
    ok: i64,
    data: Option<Value>,
    error: Option<String>,
}

/// Unwrap a memory API response body down to the raw memory JSON text.
///
/// String data is returned as-is unless it starts with `gz:`, in which case
/// the remainder is base64-decoded and gunzipped. Non-string data is
/// re-serialized, since the API inlines small values directly.
pub fn decode_memory_text(body: &str) -> Result<String, EnvelopeError> {
    let envelope: MemoryEnvelope = serde_json::from_str(body).map_err(|error| {
        EnvelopeError::Malformed(format!("memory response is not an envelope: {error}"))
    })?;

    if envelope.ok != 1 {
        return Err(EnvelopeError::Api(envelope.error.unwrap_or_else(|| {
            format!("memory API answered ok={}", envelope.ok)
        })));
    }

    match envelope.data {
        None | Some(Value::Null) => Err(EnvelopeError::EmptyPath),
        Some(Value::String(text)) => match text.strip_prefix(GZ_PREFIX) {
            Some(compressed) => inflate_memory(compressed),
            None => Ok(text),
        },
        Some(other) => Ok(other.to_string()),
    }
}

fn inflate_memory(payload: &str) -> Result<String, EnvelopeError> {
    let compressed = STANDARD.decode(payload).map_err(|error| {
        EnvelopeError::Encoding(format!("gz memory value is not base64: {error}"))
    })?;

    let mut text = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut text)
        .map_err(|error| {
            EnvelopeError::Encoding(format!("gz memory value did not inflate: {error}"))
        })?;
    Ok(text)
}
