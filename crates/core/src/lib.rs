//! Domain types and pure logic for webhook-backed image generation.
//!
//! Everything in this crate is free of I/O: request composition, the
//! response extractor that recovers a base64 image from an untrusted
//! webhook body, image decoding, history records, and the traits the
//! outer crates implement (generator, stores).

pub mod archetype;
pub mod credits;
pub mod error;
pub mod extraction;
pub mod generator;
pub mod history;
pub mod image_data;
pub mod messages;
pub mod request;
pub mod response;
pub mod result;
pub mod types;

pub use archetype::Archetype;
pub use credits::{CreditLedgerEntry, SessionContext, UserAccount};
pub use error::{ConfigError, CoreError, ErrorKind, TransportError};
pub use extraction::{extract_image, ExtractError};
pub use generator::ImageGenerator;
pub use history::{GenerationRecord, HistoryRecord};
pub use request::{GenerationRequest, WebhookPayload};
pub use response::{interpret_response, RawResponse};
pub use result::{GenerationFailure, GenerationResult};
