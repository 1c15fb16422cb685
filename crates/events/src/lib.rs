//! Progress and lifecycle events for generation runs.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`GenerationEvent`]: what happened, with [`EventEnvelope`] adding the
//!   time it happened.

pub mod bus;

pub use bus::{EventBus, EventEnvelope, GenerationEvent};
