//! User-facing messages for each failure kind.
//!
//! Messages distinguish transient service problems ("retry later") from
//! malformed data ("contact support") so the caller can show something
//! actionable without inspecting the kind itself.

use crate::archetype::Archetype;
use crate::error::ErrorKind;
use crate::types::Credits;

/// Longest excerpt of an error body quoted back to the user.
pub const MAX_DETAIL_EXCERPT: usize = 500;

pub const NO_IMAGE_FOUND: &str = "No image data found in response. The image generation service may have failed. Please try again.";

pub const INVALID_IMAGE_DATA: &str = "Invalid image data received from the image generation service. Please try again, and contact support if this persists.";

pub const EMPTY_RESPONSE: &str = "No response received from server. The service may be temporarily unavailable. Please try again.";

pub const TIMEOUT: &str = "Request timed out. The image generation is taking longer than expected. Please try again in a few minutes.";

pub const CANCELLED: &str = "Image generation was cancelled.";

pub const NETWORK_ERROR: &str = "Network error. Please check your internet connection and try again.";

pub const PROCESSING_ACTIVE: &str = "Processing is currently active. Please wait for completion before starting another process.";

/// Message for a non-2xx response from the generation endpoint.
///
/// Well-known statuses get a fixed message; anything else quotes the
/// status line and a bounded excerpt of the body.
pub fn service_error(status: u16, reason: Option<&str>, body: &str) -> String {
    match status {
        404 => "Image generation service not found. Please contact support.".to_string(),
        500 => "Image generation service is experiencing issues. Please try again later."
            .to_string(),
        503 => "Image generation service is temporarily unavailable. Please try again in a few minutes."
            .to_string(),
        _ => {
            let head = match reason.map(str::trim).filter(|r| !r.is_empty()) {
                Some(reason) => format!("Service error ({status}): {reason}"),
                None => format!("Service error ({status})"),
            };
            let excerpt = truncate_chars(body.trim(), MAX_DETAIL_EXCERPT);
            if excerpt.is_empty() {
                format!("{head}. Please try again later.")
            } else {
                format!("{head}. Details: {excerpt}")
            }
        }
    }
}

/// Message for an item the credit budget did not cover.
pub fn insufficient_credits(archetype: Archetype, required: Credits, available: Credits) -> String {
    format!(
        "Insufficient credits. You need {required} credits to generate a {archetype}. You currently have {available} credits."
    )
}

/// Default message for a kind when no extra context is available.
pub fn for_kind(kind: ErrorKind) -> String {
    match kind {
        ErrorKind::NoImageFound => NO_IMAGE_FOUND.to_string(),
        ErrorKind::InvalidImageData => INVALID_IMAGE_DATA.to_string(),
        ErrorKind::ServiceError { status } => service_error(status, None, ""),
        ErrorKind::EmptyResponse => EMPTY_RESPONSE.to_string(),
        ErrorKind::Timeout => TIMEOUT.to_string(),
        ErrorKind::Cancelled => CANCELLED.to_string(),
        ErrorKind::InsufficientCredits => {
            "Insufficient credits for this image. Please top up and try again.".to_string()
        }
        ErrorKind::NetworkError => NETWORK_ERROR.to_string(),
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_statuses_have_fixed_messages() {
        assert!(service_error(404, None, "x").contains("contact support"));
        assert!(service_error(500, None, "x").contains("try again later"));
        assert!(service_error(503, None, "x").contains("temporarily unavailable"));
    }

    #[test]
    fn other_statuses_quote_body() {
        let msg = service_error(502, None, "  upstream died  ");
        assert_eq!(msg, "Service error (502). Details: upstream died");
    }

    #[test]
    fn other_statuses_include_reason_phrase() {
        let msg = service_error(502, Some("Bad Gateway"), "upstream died");
        assert_eq!(msg, "Service error (502): Bad Gateway. Details: upstream died");

        let msg = service_error(418, Some("I'm a teapot"), "");
        assert_eq!(msg, "Service error (418): I'm a teapot. Please try again later.");
    }

    #[test]
    fn body_excerpt_is_bounded() {
        let body = "é".repeat(2 * MAX_DETAIL_EXCERPT);
        let msg = service_error(418, None, &body);
        assert_eq!(msg.chars().filter(|c| *c == 'é').count(), MAX_DETAIL_EXCERPT);
    }

    #[test]
    fn insufficient_credits_mentions_amounts() {
        let msg = insufficient_credits(Archetype::Infographic, 10, 3);
        assert!(msg.contains("need 10 credits"));
        assert!(msg.contains("have 3 credits"));
        assert!(msg.contains("infographic"));
    }

    #[test]
    fn every_kind_has_a_distinct_message() {
        let kinds = [
            ErrorKind::NoImageFound,
            ErrorKind::InvalidImageData,
            ErrorKind::ServiceError { status: 404 },
            ErrorKind::EmptyResponse,
            ErrorKind::Timeout,
            ErrorKind::Cancelled,
            ErrorKind::InsufficientCredits,
            ErrorKind::NetworkError,
        ];
        let mut msgs: Vec<_> = kinds.into_iter().map(for_kind).collect();
        msgs.sort();
        msgs.dedup();
        assert_eq!(msgs.len(), kinds.len());
    }
}
