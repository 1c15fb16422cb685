use std::time::Duration;

use imagegen_core::{
    interpret_response, GenerationFailure, GenerationRequest, GenerationResult, ImageGenerator,
    TransportError,
};
use tokio_util::sync::CancellationToken;

/// Run one generator call under a wall-clock `timeout`, abandoning it if
/// `cancel` fires first, and classify the outcome.
pub async fn dispatch(
    generator: &dyn ImageGenerator,
    request: &GenerationRequest,
    timeout: Duration,
    cancel: &CancellationToken,
) -> GenerationResult {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => GenerationFailure::cancelled().into(),
        outcome = tokio::time::timeout(timeout, generator.generate(request)) => match outcome {
            Ok(Ok(raw)) => interpret_response(&raw, request.archetype()),
            Ok(Err(e)) => GenerationFailure::from(&e).into(),
            Err(_) => GenerationFailure::from(&TransportError::Timeout(timeout)).into(),
        },
    }
}
