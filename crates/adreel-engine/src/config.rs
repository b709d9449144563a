use std::env;
use std::time::Duration;

use adreel_contracts::models::{
    ModelRegistry, ModelSelector, CAP_IMAGE, CAP_SPEECH, CAP_VIDEO, CAP_VISION,
};
use anyhow::Result;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_VOICE: &str = "Kore";
const DEFAULT_POLL_INTERVAL_S: f64 = 10.0;
const DEFAULT_REQUEST_TIMEOUT_S: f64 = 120.0;

/// Knobs shared by the pipeline, the model creator and the Gemini binding.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub api_base: String,
    pub text_model: Option<String>,
    pub image_model: Option<String>,
    pub video_model: Option<String>,
    pub speech_model: Option<String>,
    pub voice: String,
    pub video_poll_interval: Duration,
    /// Unset means the video job is polled until it reports completion.
    pub video_poll_max_attempts: Option<u32>,
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            text_model: None,
            image_model: None,
            video_model: None,
            speech_model: None,
            voice: DEFAULT_VOICE.to_string(),
            video_poll_interval: Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_S),
            video_poll_max_attempts: None,
            request_timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT_S),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base: non_empty_env("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.api_base),
            text_model: non_empty_env("ADREEL_TEXT_MODEL"),
            image_model: non_empty_env("ADREEL_IMAGE_MODEL"),
            video_model: non_empty_env("ADREEL_VIDEO_MODEL"),
            speech_model: non_empty_env("ADREEL_SPEECH_MODEL"),
            voice: non_empty_env("ADREEL_VOICE").unwrap_or(defaults.voice),
            video_poll_interval: env_seconds(
                "ADREEL_VIDEO_POLL_INTERVAL_S",
                DEFAULT_POLL_INTERVAL_S,
                0.0,
                600.0,
            ),
            video_poll_max_attempts: non_empty_env("ADREEL_VIDEO_POLL_MAX_ATTEMPTS")
                .and_then(|value| value.parse::<u32>().ok())
                .filter(|value| *value > 0),
            request_timeout: env_seconds(
                "ADREEL_REQUEST_TIMEOUT_S",
                DEFAULT_REQUEST_TIMEOUT_S,
                5.0,
                900.0,
            ),
        }
    }
}

/// Model names for each capability, after registry fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModels {
    pub text: String,
    pub image: String,
    pub video: String,
    pub speech: String,
    pub fallbacks: Vec<String>,
}

impl EngineConfig {
    /// Picks one model per capability among the models `provider` serves.
    /// Unknown or mismatched overrides fall back to the provider default.
    pub fn resolve_models(&self, provider: &str) -> Result<ResolvedModels> {
        let selector = ModelSelector::new(Some(ModelRegistry::for_provider(provider)));
        let mut fallbacks = Vec::new();
        let mut pick = |requested: &Option<String>, capability: &str| -> Result<String> {
            let selection = selector
                .select(requested.as_deref(), capability)
                .map_err(|err| anyhow::anyhow!("provider '{provider}': {err}"))?;
            if let Some(reason) = selection.fallback_reason {
                fallbacks.push(reason);
            }
            Ok(selection.model.name)
        };
        let text = pick(&self.text_model, CAP_VISION)?;
        let image = pick(&self.image_model, CAP_IMAGE)?;
        let video = pick(&self.video_model, CAP_VIDEO)?;
        let speech = pick(&self.speech_model, CAP_SPEECH)?;
        Ok(ResolvedModels {
            text,
            image,
            video,
            speech,
            fallbacks,
        })
    }
}

pub fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_seconds(key: &str, default: f64, min: f64, max: f64) -> Duration {
    Duration::from_secs_f64(parse_seconds(non_empty_env(key).as_deref(), default, min, max))
}

fn parse_seconds(raw: Option<&str>, default: f64, min: f64, max: f64) -> f64 {
    let Some(parsed) = raw.and_then(|value| value.parse::<f64>().ok()) else {
        return default;
    };
    if !parsed.is_finite() {
        return default;
    }
    parsed.clamp(min, max)
}
