use std::collections::BTreeMap;
use std::sync::Arc;

use adreel_contracts::brief::AspectRatio;
use adreel_contracts::codec::EncodedImage;
use anyhow::Result;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::dryrun::DryrunProvider;
use crate::gemini::GeminiProvider;

/// One element of a multimodal prompt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContentPart<'a> {
    Text(&'a str),
    Image(&'a EncodedImage),
}

#[derive(Debug, Clone)]
pub struct ImageRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub references: Vec<&'a EncodedImage>,
    pub aspect_ratio: Option<AspectRatio>,
}

#[derive(Debug, Clone)]
pub struct VideoRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub image: &'a EncodedImage,
    pub aspect_ratio: AspectRatio,
}

#[derive(Debug, Clone)]
pub struct SpeechRequest<'a> {
    pub model: &'a str,
    pub text: &'a str,
    pub voice: &'a str,
}

/// Handle to a long-running video render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoJob {
    pub handle: String,
    pub done: bool,
    pub video_uri: Option<String>,
    pub error: Option<String>,
}

impl VideoJob {
    pub fn pending(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            done: false,
            video_uri: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedMedia {
    pub bytes: Vec<u8>,
    pub media_type: Option<String>,
}

/// The remote generative service, one method per capability the ad pipeline
/// and the model creator consume. Calls block until the service answers.
pub trait CapabilityProvider: Send + Sync {
    fn name(&self) -> &str;

    fn generate_text(&self, model: &str, parts: &[ContentPart<'_>]) -> Result<String>;

    /// Returns the JSON document the service produced for `schema`. Callers
    /// deserialize it into their own types.
    fn generate_structured(
        &self,
        model: &str,
        parts: &[ContentPart<'_>],
        schema: &Value,
    ) -> Result<Value>;

    fn generate_image(&self, request: &ImageRequest<'_>) -> Result<EncodedImage>;

    fn edit_image(
        &self,
        model: &str,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<EncodedImage>;

    fn submit_video(&self, request: &VideoRequest<'_>) -> Result<VideoJob>;

    fn poll_video(&self, job: &VideoJob) -> Result<VideoJob>;

    fn download_video(&self, uri: &str) -> Result<DownloadedMedia>;

    /// Raw 16-bit mono PCM at 24 kHz.
    fn synthesize_speech(&self, request: &SpeechRequest<'_>) -> Result<Vec<u8>>;
}

#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn CapabilityProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: CapabilityProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Arc::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CapabilityProvider>> {
        self.providers.get(name.trim()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

pub fn default_provider_registry(config: &EngineConfig) -> Result<ProviderRegistry> {
    let mut providers = ProviderRegistry::new();
    providers.register(DryrunProvider);
    providers.register(GeminiProvider::new(config)?);
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_lists_providers_in_name_order() -> anyhow::Result<()> {
        let providers = default_provider_registry(&EngineConfig::default())?;
        assert_eq!(providers.names(), vec!["dryrun", "gemini"]);
        assert!(providers.get(" dryrun ").is_some());
        assert!(providers.get("openai").is_none());
        Ok(())
    }
}
