use imagegen_core::types::Credits;
use imagegen_core::{messages, Archetype, ConfigError, GenerationFailure};

/// Errors surfaced by the pipeline to its caller.
///
/// Per-item batch failures are not errors; they are recorded in the
/// [`BatchJob`](crate::BatchJob) results.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Another submission or batch is still running.
    #[error("{}", messages::PROCESSING_ACTIVE)]
    Busy,

    /// A single submission failed; the message is user-facing.
    #[error(transparent)]
    Generation(#[from] GenerationFailure),

    /// The budget cannot pay for even the cheapest item of a batch.
    #[error(
        "Insufficient credits. You need at least {required} credits to generate a {archetype}. You currently have {available} credits."
    )]
    InsufficientCredits {
        archetype: Archetype,
        required: Credits,
        available: Credits,
    },

    #[error("Batch has no items")]
    EmptyBatch,

    #[error("Nothing to retry: no request has been submitted yet")]
    NothingToRetry,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use imagegen_core::ErrorKind;

    use super::*;

    #[test]
    fn busy_uses_processing_message() {
        assert_eq!(PipelineError::Busy.to_string(), messages::PROCESSING_ACTIVE);
    }

    #[test]
    fn insufficient_credits_names_the_shortfall() {
        let err = PipelineError::InsufficientCredits {
            archetype: Archetype::Infographic,
            required: 10,
            available: 4,
        };
        let message = err.to_string();
        assert!(message.contains("10 credits"));
        assert!(message.contains("infographic"));
        assert!(message.contains("4 credits"));
    }

    #[test]
    fn generation_failure_is_displayed_verbatim() {
        let failure = GenerationFailure::new(ErrorKind::Timeout);
        let err = PipelineError::from(failure.clone());
        assert_eq!(err.user_message(), failure.message);
    }
}
