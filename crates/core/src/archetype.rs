//! Image archetypes and their per-generation credit cost.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Credits;

/// Credits charged for one blog featured image.
pub const FEATURED_IMAGE_COST: Credits = 5;

/// Credits charged for one infographic.
pub const INFOGRAPHIC_COST: Credits = 10;

/// The requested image category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Archetype {
    /// Header image for a blog post.
    FeaturedImage,
    /// Visual summary of a piece of content.
    Infographic,
}

impl Archetype {
    /// Value sent as `image_type` to the generation webhook.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::FeaturedImage => "Featured Image",
            Self::Infographic => "Infographic",
        }
    }

    /// Short name used in persisted records and download filenames.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::FeaturedImage => "blog",
            Self::Infographic => "infographic",
        }
    }

    /// Human-readable label for messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::FeaturedImage => "blog featured image",
            Self::Infographic => "infographic",
        }
    }

    pub fn credit_cost(self) -> Credits {
        match self {
            Self::FeaturedImage => FEATURED_IMAGE_COST,
            Self::Infographic => INFOGRAPHIC_COST,
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Archetype {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "featured-image" | "featured_image" | "featured image" | "blog" => {
                Ok(Self::FeaturedImage)
            }
            "infographic" => Ok(Self::Infographic),
            other => Err(CoreError::Validation(format!(
                "Unknown image archetype '{other}'. Must be one of: featured-image, infographic"
            ))),
        }
    }
}
