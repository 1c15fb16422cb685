//! JSON-lines batch input.
//!
//! One object per line: `{"title"?: str, "content": str, "style"?: str,
//! "colour"?: str}`. `title` is required for featured images and ignored
//! for infographics. Blank lines are skipped.

use std::path::Path;

use anyhow::{bail, Context};
use imagegen_core::{Archetype, GenerationRequest};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InputItem {
    #[serde(default)]
    title: Option<String>,
    content: String,
    #[serde(default, alias = "color")]
    colour: Option<String>,
    #[serde(default)]
    style: Option<String>,
}

impl InputItem {
    fn into_request(self, archetype: Archetype) -> anyhow::Result<GenerationRequest> {
        let request = match archetype {
            Archetype::FeaturedImage => GenerationRequest::featured_image(
                self.title.unwrap_or_default(),
                self.content,
            )?,
            Archetype::Infographic => GenerationRequest::infographic(self.content)?,
        };
        let request = match self.style {
            Some(style) => request.with_style(style),
            None => request,
        };
        Ok(match self.colour {
            Some(colour) => request.with_colour(colour),
            None => request,
        })
    }
}

/// Parse batch items from JSON-lines text.
pub fn parse_items(text: &str, archetype: Archetype) -> anyhow::Result<Vec<GenerationRequest>> {
    let mut items = Vec::new();
    for (number, line) in text.lines().enumerate().map(|(i, l)| (i + 1, l.trim())) {
        if line.is_empty() {
            continue;
        }
        let item: InputItem =
            serde_json::from_str(line).with_context(|| format!("line {number}: invalid JSON"))?;
        let request = item
            .into_request(archetype)
            .with_context(|| format!("line {number}: invalid item"))?;
        items.push(request);
    }
    if items.is_empty() {
        bail!("input contains no items");
    }
    Ok(items)
}

pub async fn read_items(path: &Path, archetype: Archetype) -> anyhow::Result<Vec<GenerationRequest>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_items(&text, archetype)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_featured_items_with_options() {
        let text = r#"
{"title": "Launch", "content": "We shipped", "style": "flat", "colour": "teal"}

{"title": "Roadmap", "content": "What is next"}
"#;
        let items = parse_items(text, Archetype::FeaturedImage).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title(), Some("Launch"));
        assert_eq!(items[0].style(), Some("flat"));
        assert_eq!(items[0].colour(), Some("teal"));
        assert_eq!(items[1].style(), None);
    }

    #[test]
    fn infographic_items_ignore_title() {
        let text = r#"{"title": "ignored", "content": "Q3 revenue by region", "color": "blue"}"#;
        let items = parse_items(text, Archetype::Infographic).unwrap();
        assert_eq!(items[0].archetype(), Archetype::Infographic);
        assert_eq!(items[0].colour(), Some("blue"));
        assert_eq!(items[0].image_detail(), "Q3 revenue by region, Colour: blue");
    }

    #[test]
    fn reports_line_numbers() {
        let text = "{\"content\": \"ok\"}\n{\"content\": \"   \"}\n";
        let err = parse_items(text, Archetype::Infographic).unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let err = parse_items("not json", Archetype::Infographic).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn featured_items_need_a_title() {
        let err = parse_items(r#"{"content": "untitled"}"#, Archetype::FeaturedImage).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(parse_items("\n\n", Archetype::FeaturedImage).is_err());
    }
}
