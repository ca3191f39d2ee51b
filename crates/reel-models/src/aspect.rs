//! Output aspect ratio.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported output aspect ratios.
///
/// A closed set: every ratio maps to a fixed image resolution used for
/// frame synthesis, so unknown ratios are rejected at project creation
/// rather than surfacing mid-pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum AspectRatio {
    /// Widescreen 16:9 (1920x1080)
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    /// Vertical 9:16 (1080x1920) for Shorts/Reels
    #[serde(rename = "9:16")]
    Portrait,
    /// Square 1:1 (1024x1024)
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    pub const ALL: &'static [AspectRatio] =
        &[AspectRatio::Landscape, AspectRatio::Portrait, AspectRatio::Square];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Square => "1:1",
        }
    }

    /// Frame dimensions in pixels for image synthesis.
    pub fn image_dimensions(&self) -> (u32, u32) {
        match self {
            AspectRatio::Landscape => (1920, 1080),
            AspectRatio::Portrait => (1080, 1920),
            AspectRatio::Square => (1024, 1024),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "16:9" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Portrait),
            "1:1" => Ok(AspectRatio::Square),
            _ => Err(AspectRatioParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown aspect ratio: {0}, expected one of 16:9, 9:16, 1:1")]
pub struct AspectRatioParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_parse() {
        assert_eq!("16:9".parse::<AspectRatio>().unwrap(), AspectRatio::Landscape);
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert_eq!("1:1".parse::<AspectRatio>().unwrap(), AspectRatio::Square);
        assert!("4:3".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_image_dimensions() {
        assert_eq!(AspectRatio::Landscape.image_dimensions(), (1920, 1080));
        assert_eq!(AspectRatio::Portrait.image_dimensions(), (1080, 1920));
        assert_eq!(AspectRatio::Square.image_dimensions(), (1024, 1024));
    }

    #[test]
    fn test_serde_uses_ratio_strings() {
        let json = serde_json::to_string(&AspectRatio::Portrait).unwrap();
        assert_eq!(json, "\"9:16\"");
        let back: AspectRatio = serde_json::from_str("\"16:9\"").unwrap();
        assert_eq!(back, AspectRatio::Landscape);
    }
}
