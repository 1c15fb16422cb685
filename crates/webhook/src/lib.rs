//! HTTP client for the webhook-based image generation endpoint.
//!
//! [`WebhookClient`] posts a generation payload and hands back the raw
//! response; it implements [`imagegen_core::ImageGenerator`] so the
//! pipeline can drive it without knowing about HTTP.

pub mod client;
pub mod config;

pub use client::{WebhookClient, WebhookError};
pub use config::WebhookConfig;
pub use imagegen_core::ConfigError;
