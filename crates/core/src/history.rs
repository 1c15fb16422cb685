//! History records kept for each successful generation.

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::archetype::Archetype;
use crate::request::GenerationRequest;
use crate::types::{Credits, Timestamp, UserId};

/// Title recorded for infographics, which have no title of their own.
pub const INFOGRAPHIC_TITLE: &str = "Infographic";

/// Number of content characters used when a filename has no title.
const FILENAME_CONTENT_CHARS: usize = 30;

/// Number of random characters in a history id.
const ID_RANDOM_CHARS: usize = 9;

/// A generated image in the user's local history.
///
/// Created once per successful generation and never mutated afterwards;
/// the only lifecycle operations are individual and bulk removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub archetype: Archetype,
    pub image_base64: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
    pub created_at: Timestamp,
}

impl HistoryRecord {
    /// Build the record for a request that just produced `image_base64`.
    pub fn from_success(request: &GenerationRequest, image_base64: String) -> Self {
        let created_at = Utc::now();
        let title = match request.archetype() {
            Archetype::FeaturedImage => request.title().unwrap_or_default().to_string(),
            Archetype::Infographic => INFOGRAPHIC_TITLE.to_string(),
        };
        Self {
            id: generate_history_id(created_at),
            archetype: request.archetype(),
            image_base64,
            title,
            content: request.prompt_text().to_string(),
            style: request.style().map(str::to_string),
            colour: request.colour().map(str::to_string),
            created_at,
        }
    }

    /// Filename to save this image under, with the given extension.
    pub fn download_filename(&self, extension: &str) -> String {
        let title = match self.archetype {
            Archetype::FeaturedImage => Some(self.title.as_str()),
            Archetype::Infographic => None,
        };
        download_filename(
            self.archetype,
            title,
            &self.content,
            extension,
            self.created_at.timestamp_millis(),
        )
    }
}

/// A generation as persisted in the hosted backend's `image_generations`
/// table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub user_id: UserId,
    /// Archetype short name (`blog` / `infographic`).
    pub image_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
    pub credits_used: Credits,
    pub image_data: String,
}

impl GenerationRecord {
    pub fn new(user_id: impl Into<UserId>, record: &HistoryRecord) -> Self {
        let title = match record.archetype {
            Archetype::FeaturedImage => Some(record.title.clone()),
            Archetype::Infographic => None,
        };
        Self {
            user_id: user_id.into(),
            image_type: record.archetype.short_name().to_string(),
            title,
            content: Some(record.content.clone()),
            style: record.style.clone(),
            colour: record.colour.clone(),
            credits_used: record.archetype.credit_cost(),
            image_data: record.image_base64.clone(),
        }
    }
}

/// Generate a history id of the form `img-<millis>-<9 random chars>`.
pub fn generate_history_id(at: Timestamp) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ID_RANDOM_CHARS)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("img-{}-{suffix}", at.timestamp_millis())
}

/// Build a download filename:
/// `seo-engine-<short name>-<safe title>-<millis>.<extension>`.
///
/// The title falls back to the first 30 characters of the content, then to
/// `image`. It is reduced to ASCII letters, digits, whitespace, `-` and
/// `_`, whitespace runs become `-`, and the result is lowercased.
pub fn download_filename(
    archetype: Archetype,
    title: Option<&str>,
    content: &str,
    extension: &str,
    millis: i64,
) -> String {
    let source: String = match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => title.to_string(),
        None if !content.trim().is_empty() => content.chars().take(FILENAME_CONTENT_CHARS).collect(),
        None => "image".to_string(),
    };

    let filtered: String = source
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();
    let mut safe_title = filtered
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    if safe_title.is_empty() {
        safe_title = "image".to_string();
    }

    format!(
        "seo-engine-{}-{safe_title}-{millis}.{extension}",
        archetype.short_name()
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn history_id_shape() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let id = generate_history_id(at);
        let suffix = id.strip_prefix("img-1700000000123-").unwrap();
        assert_eq!(suffix.len(), ID_RANDOM_CHARS);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn history_ids_are_unique() {
        let at = Utc::now();
        assert_ne!(generate_history_id(at), generate_history_id(at));
    }

    #[test]
    fn featured_image_record_keeps_title() {
        let req = GenerationRequest::featured_image("My Post", "Body text")
            .unwrap()
            .with_colour("red");
        let record = HistoryRecord::from_success(&req, "b64".into());
        assert_eq!(record.title, "My Post");
        assert_eq!(record.content, "Body text");
        assert_eq!(record.colour.as_deref(), Some("red"));
        assert_eq!(record.style, None);
    }

    #[test]
    fn infographic_record_uses_fixed_title() {
        let req = GenerationRequest::infographic("Stats").unwrap();
        let record = HistoryRecord::from_success(&req, "b64".into());
        assert_eq!(record.title, INFOGRAPHIC_TITLE);
    }

    #[test]
    fn filename_from_title() {
        let name = download_filename(
            Archetype::FeaturedImage,
            Some("Hello,  World! 2024"),
            "ignored",
            "png",
            42,
        );
        assert_eq!(name, "seo-engine-blog-hello-world-2024-42.png");
    }

    #[test]
    fn filename_from_content_prefix() {
        let name = download_filename(
            Archetype::Infographic,
            None,
            "Ten tips for faster page loads and better rankings",
            "webp",
            7,
        );
        assert_eq!(name, "seo-engine-infographic-ten-tips-for-faster-page-loads-7.webp");
    }

    #[test]
    fn filename_fallback() {
        let name = download_filename(Archetype::Infographic, Some("  "), "", "png", 1);
        assert_eq!(name, "seo-engine-infographic-image-1.png");
        let name = download_filename(Archetype::Infographic, Some("!!!"), "", "png", 1);
        assert_eq!(name, "seo-engine-infographic-image-1.png");
    }

    #[test]
    fn generation_record_from_history() {
        let req = GenerationRequest::featured_image("T", "C").unwrap();
        let record = HistoryRecord::from_success(&req, "b64".into());
        let row = GenerationRecord::new("user-1", &record);
        assert_eq!(row.image_type, "blog");
        assert_eq!(row.credits_used, 5);
        assert_eq!(row.title.as_deref(), Some("T"));
        assert_eq!(row.image_data, "b64");
    }
}
