//! Recovery of a base64 image payload from an untrusted response body.
//!
//! The generation webhook does not commit to a response shape. A body may
//! be a JSON object with an `image` field, a JSON string that itself holds
//! encoded JSON, loose text with an `"image":"..."` fragment somewhere in
//! it, or bare base64. Extraction runs an ordered list of strategies over
//! the body; the first one that proposes a candidate wins, and that
//! candidate is then cleaned and validated before anything downstream is
//! allowed to decode it.

use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use serde_json::Value;

use crate::error::ErrorKind;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Minimum accepted payload length, in base64 characters.
pub const MIN_IMAGE_BASE64_LEN: usize = 1_000;

/// Number of leading characters decoded as a validity probe.
pub const DECODE_PROBE_LEN: usize = 100;

/// Prefix of an inline image data URL.
const DATA_URL_PREFIX: &str = "data:image/";

/// A whole cleaned payload: base64 alphabet with at most two padding chars.
static BASE64_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/]*={0,2}$").expect("valid regex"));

/// One contiguous run of base64 alphabet characters.
static BASE64_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9+/]+={0,2}").expect("valid regex"));

/// An `"image":"<value>"` pair embedded in arbitrary text.
static IMAGE_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""image"\s*:\s*"([^"]+)""#).expect("valid regex"));

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// No strategy proposed a candidate.
    #[error("No image data found in response")]
    NoImageFound,

    /// A candidate was found but failed validation.
    #[error("Invalid image data: {0}")]
    InvalidImageData(String),
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoImageFound => ErrorKind::NoImageFound,
            Self::InvalidImageData(_) => ErrorKind::InvalidImageData,
        }
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Parsed JSON object with a string `image` field.
    JsonObject,
    /// Parsed JSON string, itself holding JSON or a long raw payload.
    JsonString,
    /// `"image":"..."` fragment in text that is not valid JSON.
    EmbeddedField,
    /// Longest run of base64 alphabet characters anywhere in the text.
    Base64Run,
}

/// A response body with its (possibly failed) JSON parse, shared by all
/// strategies so the body is parsed at most once.
#[derive(Debug)]
pub struct ResponseBody<'a> {
    pub raw: &'a str,
    pub parsed: Option<Value>,
}

impl<'a> ResponseBody<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            parsed: serde_json::from_str(raw.trim()).ok(),
        }
    }
}

type StrategyFn = fn(&ResponseBody<'_>) -> Option<String>;

/// Strategies in priority order.
const STRATEGIES: &[(Strategy, StrategyFn)] = &[
    (Strategy::JsonObject, from_json_object),
    (Strategy::JsonString, from_json_string),
    (Strategy::EmbeddedField, from_embedded_field),
    (Strategy::Base64Run, from_base64_run),
];

/// Take the `image` field of a parsed JSON object.
pub fn from_json_object(body: &ResponseBody<'_>) -> Option<String> {
    body.parsed.as_ref().and_then(image_field)
}

/// Handle a body that parsed to a JSON string.
///
/// The string is parsed again and searched for an `image` field. If the
/// second parse fails, a string longer than the minimum payload length is
/// taken whole as the candidate.
pub fn from_json_string(body: &ResponseBody<'_>) -> Option<String> {
    let Some(Value::String(inner)) = &body.parsed else {
        return None;
    };
    match serde_json::from_str::<Value>(inner.trim()) {
        Ok(value) => image_field(&value),
        Err(_) if inner.len() > MIN_IMAGE_BASE64_LEN => Some(inner.clone()),
        Err(_) => None,
    }
}

/// Pull an `image` value out of text that did not parse as JSON.
///
/// Tries a second parse of the outermost `{...}` span (JSON wrapped in
/// other output), then falls back to matching the `"image":"..."` pair.
pub fn from_embedded_field(body: &ResponseBody<'_>) -> Option<String> {
    if body.parsed.is_some() || !body.raw.contains("\"image\"") {
        return None;
    }

    if let Some(value) = outermost_object(body.raw).and_then(|s| serde_json::from_str(s).ok()) {
        if let Some(image) = image_field(&value) {
            return Some(image);
        }
    }

    IMAGE_FIELD_RE
        .captures(body.raw)
        .and_then(|caps| caps.get(1))
        .map(|m| unescape_json_fragment(m.as_str()))
}

/// Last resort: the longest run of base64 alphabet characters (with up to
/// two trailing `=`) of at least the minimum payload length.
pub fn from_base64_run(body: &ResponseBody<'_>) -> Option<String> {
    BASE64_RUN_RE
        .find_iter(body.raw)
        .filter(|m| m.len() >= MIN_IMAGE_BASE64_LEN)
        .max_by_key(|m| m.len())
        .map(|m| m.as_str().to_string())
}

fn image_field(value: &Value) -> Option<String> {
    value
        .get("image")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Resolve JSON escapes (`\/`, `\n`, ...) in a regex-captured string
/// value. Falls back to the raw capture if it is not a valid JSON string
/// body.
fn unescape_json_fragment(fragment: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{fragment}\"")).unwrap_or_else(|_| fragment.to_string())
}

// ---------------------------------------------------------------------------
// Candidate selection and validation
// ---------------------------------------------------------------------------

/// Run the strategies in order and return the first candidate proposed.
pub fn find_candidate(raw_body: &str) -> Option<(Strategy, String)> {
    let body = ResponseBody::new(raw_body);
    STRATEGIES
        .iter()
        .find_map(|(strategy, extract)| extract(&body).map(|candidate| (*strategy, candidate)))
}

/// Clean a candidate and check that it is a plausible base64 image.
///
/// Strips a leading `data:image/...;base64,` prefix, removes all
/// whitespace, then requires the base64 alphabet, the minimum length, and
/// a successful decode of the leading [`DECODE_PROBE_LEN`] characters.
pub fn clean_candidate(candidate: &str) -> Result<String, ExtractError> {
    let trimmed = candidate.trim_start();
    let payload = if trimmed.starts_with(DATA_URL_PREFIX) {
        trimmed
            .split_once(',')
            .map(|(_, rest)| rest)
            .ok_or_else(|| {
                ExtractError::InvalidImageData("data URL has no payload".to_string())
            })?
    } else {
        trimmed
    };

    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    if !BASE64_RE.is_match(&cleaned) {
        return Err(ExtractError::InvalidImageData(
            "contains characters outside the base64 alphabet".to_string(),
        ));
    }
    if cleaned.len() < MIN_IMAGE_BASE64_LEN {
        return Err(ExtractError::InvalidImageData(format!(
            "payload too short ({} < {MIN_IMAGE_BASE64_LEN} characters)",
            cleaned.len()
        )));
    }
    STANDARD
        .decode(&cleaned[..DECODE_PROBE_LEN])
        .map_err(|e| ExtractError::InvalidImageData(format!("decode probe failed: {e}")))?;

    Ok(cleaned)
}

/// Recover a validated base64 image payload from a raw response body.
pub fn extract_image(raw_body: &str) -> Result<String, ExtractError> {
    let Some((strategy, candidate)) = find_candidate(raw_body) else {
        tracing::debug!(body_len = raw_body.len(), "No extraction candidate found");
        return Err(ExtractError::NoImageFound);
    };

    tracing::debug!(
        ?strategy,
        candidate_len = candidate.len(),
        "Extraction candidate found",
    );

    clean_candidate(&candidate).inspect_err(|e| {
        tracing::debug!(?strategy, error = %e, "Extraction candidate rejected");
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
