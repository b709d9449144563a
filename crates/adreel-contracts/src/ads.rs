use serde::{Deserialize, Serialize};

use crate::brief::{AspectRatio, Platform};
use crate::media::MediaRef;

pub const AD_COPY_VARIATIONS: usize = 3;
pub const HASHTAG_COUNT: usize = 5;

/// Creative brief derived from the image analysis. The opening-frame prompt
/// only ever grows while the frame is being corrected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdConcept {
    pub title: String,
    pub idea: String,
    pub description: String,
    pub opening_frame_prompt: String,
}

impl AdConcept {
    pub fn ensure_complete(&self) -> Result<(), String> {
        let missing = [
            ("title", &self.title),
            ("idea", &self.idea),
            ("description", &self.description),
            ("openingFramePrompt", &self.opening_frame_prompt),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect::<Vec<&str>>();
        if missing.is_empty() {
            return Ok(());
        }
        Err(format!("concept is missing {}", missing.join(", ")))
    }

    pub fn append_correction(&mut self, attempt: u8, suggestion: &str) {
        let suggestion = suggestion.trim();
        if suggestion.is_empty() {
            return;
        }
        self.opening_frame_prompt
            .push_str(&format!("\n\nCorrection after attempt {attempt}: {suggestion}"));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdAssets {
    pub ad_copy_variations: Vec<String>,
    pub hashtags: Vec<String>,
}

impl AdAssets {
    /// Strips hashtag markers and enforces the 3 copy / 5 hashtag contract.
    pub fn normalized(self) -> Result<Self, String> {
        let ad_copy_variations = self
            .ad_copy_variations
            .into_iter()
            .map(|copy| copy.trim().to_string())
            .collect::<Vec<String>>();
        let hashtags = self
            .hashtags
            .into_iter()
            .map(|tag| tag.trim().trim_start_matches('#').trim().to_string())
            .collect::<Vec<String>>();

        if ad_copy_variations.len() != AD_COPY_VARIATIONS {
            return Err(format!(
                "expected {AD_COPY_VARIATIONS} ad copy variations, got {}",
                ad_copy_variations.len()
            ));
        }
        if hashtags.len() != HASHTAG_COUNT {
            return Err(format!(
                "expected {HASHTAG_COUNT} hashtags, got {}",
                hashtags.len()
            ));
        }
        if ad_copy_variations.iter().any(String::is_empty) {
            return Err("ad copy variation is empty".to_string());
        }
        if hashtags.iter().any(String::is_empty) {
            return Err("hashtag is empty".to_string());
        }
        Ok(Self {
            ad_copy_variations,
            hashtags,
        })
    }
}

/// How the opening-frame quality loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QcOutcome {
    Passed { attempt: u8 },
    Exhausted { attempts: u8, last_suggestion: String },
}

impl QcOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, QcOutcome::Passed { .. })
    }

    pub fn attempts(&self) -> u8 {
        match self {
            QcOutcome::Passed { attempt } => *attempt,
            QcOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn note(&self) -> String {
        match self {
            QcOutcome::Passed { attempt: 1 } => {
                "Passed quality control on the first attempt.".to_string()
            }
            QcOutcome::Passed { attempt } => format!(
                "Passed on attempt {attempt} after {} automatic correction(s).",
                attempt - 1
            ),
            QcOutcome::Exhausted {
                attempts,
                last_suggestion,
            } => format!(
                "Failed quality control after {attempts} attempts. Last issue: {}",
                last_suggestion.trim()
            ),
        }
    }
}

/// The delivered ad package of one successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalOutput {
    pub title: String,
    pub idea: String,
    pub description: String,
    pub opening_frame_prompt: String,
    pub platform: Platform,
    pub aspect_ratio: AspectRatio,
    pub tone: String,
    pub opening_frame_url: MediaRef,
    pub script: String,
    pub video_url: MediaRef,
    pub qc_report: String,
    pub qc_passed: bool,
    pub qc_attempts: u8,
    pub ad_copy_variations: Vec<String>,
    pub hashtags: Vec<String>,
    pub voiceover_audio_url: Option<MediaRef>,
}
