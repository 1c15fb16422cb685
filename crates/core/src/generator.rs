use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::GenerationRequest;
use crate::response::RawResponse;

/// A remote image generator.
///
/// Implementations perform one round trip for `request` and return the
/// response untouched; status handling and payload extraction happen in
/// [`crate::response::interpret_response`]. A non-2xx status is still an
/// `Ok` here.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse, TransportError>;
}
