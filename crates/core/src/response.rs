//! Interpretation of a raw webhook response into a [`GenerationResult`].

use crate::archetype::Archetype;
use crate::error::ErrorKind;
use crate::extraction::extract_image;
use crate::result::{GenerationFailure, GenerationResult};

/// An HTTP response as received from the generation endpoint, detached
/// from any particular HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Reason phrase for `status`, e.g. `"Bad Gateway"`, when known.
    pub reason: Option<String>,
    /// Header names are stored lowercased.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: None,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Decide success or failure for a response and, on success, recover the
/// validated image payload.
///
/// - non-2xx status: [`ErrorKind::ServiceError`] carrying the status
/// - blank body: [`ErrorKind::EmptyResponse`]
/// - otherwise: the outcome of [`extract_image`]
pub fn interpret_response(response: &RawResponse, archetype: Archetype) -> GenerationResult {
    if !response.is_success() {
        tracing::warn!(
            status = response.status,
            body_len = response.body.len(),
            "Generation endpoint returned an error status",
        );
        return GenerationFailure::service_error(
            response.status,
            response.reason.as_deref(),
            &response.body,
        )
        .into();
    }

    if response.body.trim().is_empty() {
        return GenerationResult::failure(ErrorKind::EmptyResponse);
    }

    match extract_image(&response.body) {
        Ok(image_base64) => GenerationResult::Success {
            image_base64,
            archetype,
        },
        Err(e) => {
            tracing::warn!(
                error = %e,
                content_type = response.header("content-type").unwrap_or("<none>"),
                body_len = response.body.len(),
                "Could not extract image from response",
            );
            GenerationFailure::from(e).into()
        }
    }
}
