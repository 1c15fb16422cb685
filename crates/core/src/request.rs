//! Generation requests and the webhook payload built from them.

use serde::Serialize;

use crate::archetype::Archetype;
use crate::error::CoreError;

/// Maximum length of the descriptive text in characters.
pub const MAX_PROMPT_LENGTH: usize = 10_000;

/// Maximum length of a blog post title in characters.
pub const MAX_TITLE_LENGTH: usize = 500;

/// One image to generate.
///
/// Text is expected to be sanitized by the caller. Constructors only
/// validate length and emptiness. Style and colour are attached with the
/// consuming `with_*` builders before the request is handed off; there
/// are no mutators afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    archetype: Archetype,
    title: Option<String>,
    prompt_text: String,
    style: Option<String>,
    colour: Option<String>,
}

/// JSON body posted to the generation webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    pub image_type: &'static str,
    pub image_detail: String,
}

impl GenerationRequest {
    /// A blog featured image for a post with the given title and content.
    pub fn featured_image(
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let title = title.into();
        validate_title(&title)?;
        let mut request = Self::new(Archetype::FeaturedImage, content)?;
        request.title = Some(title.trim().to_string());
        Ok(request)
    }

    /// An infographic summarising the given content.
    pub fn infographic(content: impl Into<String>) -> Result<Self, CoreError> {
        Self::new(Archetype::Infographic, content)
    }

    /// A request of any archetype with no title.
    pub fn new(archetype: Archetype, prompt_text: impl Into<String>) -> Result<Self, CoreError> {
        let prompt_text = prompt_text.into();
        validate_prompt(&prompt_text)?;
        Ok(Self {
            archetype,
            title: None,
            prompt_text: prompt_text.trim().to_string(),
            style: None,
            colour: None,
        })
    }

    /// Attach a visual style. Blank values are ignored.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = non_blank(style.into());
        self
    }

    /// Attach a colour preference. Blank values are ignored.
    pub fn with_colour(mut self, colour: impl Into<String>) -> Self {
        self.colour = non_blank(colour.into());
        self
    }

    pub fn archetype(&self) -> Archetype {
        self.archetype
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub fn colour(&self) -> Option<&str> {
        self.colour.as_deref()
    }

    /// Compose the free-text description sent as `image_detail`.
    ///
    /// Featured images lead with the quoted post title; style and colour
    /// are appended as comma-separated clauses when present.
    pub fn image_detail(&self) -> String {
        let mut detail = match (self.archetype, &self.title) {
            (Archetype::FeaturedImage, Some(title)) => {
                format!("Blog post title: '{title}', Content: {}", self.prompt_text)
            }
            _ => self.prompt_text.clone(),
        };
        if let Some(style) = &self.style {
            detail.push_str(&format!(", Style: {style}"));
        }
        if let Some(colour) = &self.colour {
            detail.push_str(&format!(", Colour: {colour}"));
        }
        detail
    }

    pub fn payload(&self) -> WebhookPayload {
        WebhookPayload {
            image_type: self.archetype.wire_name(),
            image_detail: self.image_detail(),
        }
    }
}

/// Validate descriptive text: must be non-blank and within length limit.
pub fn validate_prompt(text: &str) -> Result<(), CoreError> {
    if text.trim().is_empty() {
        return Err(CoreError::Validation(
            "Content must not be empty".to_string(),
        ));
    }
    let len = text.chars().count();
    if len > MAX_PROMPT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Content exceeds maximum length of {MAX_PROMPT_LENGTH} characters (got {len})"
        )));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), CoreError> {
    if title.trim().is_empty() {
        return Err(CoreError::Validation(
            "Blog post title must not be empty".to_string(),
        ));
    }
    let len = title.chars().count();
    if len > MAX_TITLE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Blog post title exceeds maximum length of {MAX_TITLE_LENGTH} characters (got {len})"
        )));
    }
    Ok(())
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
