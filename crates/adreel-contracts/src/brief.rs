use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::EncodedImage;

pub const MIN_VIDEO_LENGTH_S: u32 = 3;
pub const MAX_VIDEO_LENGTH_S: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "TikTok")]
    TikTok,
    #[serde(rename = "Instagram Reels")]
    Reels,
    #[serde(rename = "YouTube Shorts")]
    YouTubeShorts,
    #[serde(rename = "Meta")]
    Meta,
}

impl Platform {
    pub fn label(&self) -> &'static str {
        match self {
            Platform::TikTok => "TikTok",
            Platform::Reels => "Instagram Reels",
            Platform::YouTubeShorts => "YouTube Shorts",
            Platform::Meta => "Meta",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .replace(['-', '_', ' '], "");
        match normalized.as_str() {
            "tiktok" => Ok(Platform::TikTok),
            "reels" | "instagramreels" | "instagram" => Ok(Platform::Reels),
            "youtubeshorts" | "shorts" | "youtube" => Ok(Platform::YouTubeShorts),
            "meta" | "facebook" => Ok(Platform::Meta),
            _ => Err(format!(
                "unknown platform '{raw}' (expected tiktok, reels, youtube-shorts or meta)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "9:16" | "portrait" | "vertical" => Ok(AspectRatio::Portrait),
            "16:9" | "landscape" | "horizontal" => Ok(AspectRatio::Landscape),
            _ => Err(format!("unsupported aspect ratio '{raw}' (expected 9:16 or 16:9)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BriefError {
    #[error("a product image is required")]
    MissingProductImage,

    #[error("video length must be between 3 and 15 seconds (got {0})")]
    VideoLength(u32),
}

/// The campaign brief handed to the generation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInput {
    pub product_image: Option<EncodedImage>,
    pub actor_image: Option<EncodedImage>,
    pub description: String,
    pub call_to_action: String,
    pub platform: Platform,
    pub aspect_ratio: AspectRatio,
    pub video_length_s: u32,
    pub tone: String,
    pub voiceover: bool,
}

impl UserInput {
    /// Checks the brief and hands back the product image the run will use.
    pub fn validate(&self) -> Result<&EncodedImage, BriefError> {
        let product = self
            .product_image
            .as_ref()
            .ok_or(BriefError::MissingProductImage)?;
        if !(MIN_VIDEO_LENGTH_S..=MAX_VIDEO_LENGTH_S).contains(&self.video_length_s) {
            return Err(BriefError::VideoLength(self.video_length_s));
        }
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief() -> UserInput {
        UserInput {
            product_image: Some(EncodedImage {
                payload: "aGVsbG8=".to_string(),
                media_type: "image/png".to_string(),
            }),
            actor_image: None,
            description: "Insulated steel bottle".to_string(),
            call_to_action: "Shop now".to_string(),
            platform: Platform::TikTok,
            aspect_ratio: AspectRatio::Portrait,
            video_length_s: 8,
            tone: "energetic".to_string(),
            voiceover: false,
        }
    }

    #[test]
    fn validate_requires_product_image() {
        let mut input = brief();
        input.product_image = None;
        assert_eq!(input.validate(), Err(BriefError::MissingProductImage));
    }

    #[test]
    fn validate_bounds_video_length() {
        let mut input = brief();
        input.video_length_s = 2;
        assert_eq!(input.validate(), Err(BriefError::VideoLength(2)));
        input.video_length_s = 16;
        assert_eq!(input.validate(), Err(BriefError::VideoLength(16)));
        input.video_length_s = 15;
        assert!(input.validate().is_ok());
    }

    #[test]
    fn platform_parses_common_spellings() {
        assert_eq!("TikTok".parse::<Platform>(), Ok(Platform::TikTok));
        assert_eq!("youtube-shorts".parse::<Platform>(), Ok(Platform::YouTubeShorts));
        assert_eq!("Instagram Reels".parse::<Platform>(), Ok(Platform::Reels));
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn aspect_ratio_round_trips_through_display() {
        for ratio in [AspectRatio::Portrait, AspectRatio::Landscape] {
            assert_eq!(ratio.to_string().parse::<AspectRatio>(), Ok(ratio));
        }
        assert_eq!(
            serde_json::to_value(AspectRatio::Landscape).ok(),
            Some(serde_json::json!("16:9"))
        );
    }
}
