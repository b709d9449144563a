use std::sync::Arc;

use adreel_contracts::brief::AspectRatio;
use adreel_contracts::codec::EncodedImage;
use adreel_contracts::events::EventWriter;
use adreel_contracts::media::MediaRef;
use adreel_contracts::progress::ProgressEvent;
use anyhow::Result;
use serde_json::{json, Value};

use crate::config::{EngineConfig, ResolvedModels};
use crate::credentials::CredentialManager;
use crate::error::{stage_failure, PipelineError, Stage};
use crate::media_store::MediaStore;
use crate::prompts;
use crate::provider::{CapabilityProvider, ContentPart, ImageRequest};
use crate::reporter::ProgressReporter;

/// The current model photo and every prompt that shaped it. Entry 0 is the
/// synthesis prompt; each later entry is one applied edit instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSession {
    current: EncodedImage,
    current_ref: MediaRef,
    style_description: String,
    history: Vec<String>,
}

impl ModelSession {
    pub fn current_image(&self) -> &EncodedImage {
        &self.current
    }

    pub fn current_ref(&self) -> &MediaRef {
        &self.current_ref
    }

    pub fn style_description(&self) -> &str {
        &self.style_description
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }
}

/// Builds a model photo from a style reference and a headshot, then applies
/// edits one at a time on top of the latest result.
pub struct ModelCreator {
    provider: Arc<dyn CapabilityProvider>,
    store: MediaStore,
    events: EventWriter,
    credentials: Option<Arc<dyn CredentialManager>>,
    models: ResolvedModels,
}

impl ModelCreator {
    pub fn new(
        provider: Arc<dyn CapabilityProvider>,
        store: MediaStore,
        events: EventWriter,
        config: &EngineConfig,
    ) -> Result<Self> {
        let models = config.resolve_models(provider.name())?;
        Ok(Self {
            provider,
            store,
            events,
            credentials: None,
            models,
        })
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialManager>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn create(
        &self,
        style: &EncodedImage,
        headshot: &EncodedImage,
        mut on_progress: impl FnMut(ProgressEvent),
    ) -> Result<ModelSession, PipelineError> {
        let mut progress = ProgressReporter::new(&self.events, &mut on_progress);
        let result = self.create_session(style, headshot, &mut progress);
        match &result {
            Ok(session) => self.log(
                "model_created",
                json!({
                    "path": session.current_ref.path,
                    "prompt": session.history.first(),
                }),
            ),
            Err(err) => self.log("run_failed", json!({ "error": err.to_string() })),
        }
        progress.idle();
        result
    }

    fn create_session(
        &self,
        style: &EncodedImage,
        headshot: &EncodedImage,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<ModelSession, PipelineError> {
        progress.report(1, "Analyzing style");
        let analysis_prompt = prompts::style_analysis();
        let style_description = self
            .provider
            .generate_text(
                &self.models.text,
                &[ContentPart::Image(style), ContentPart::Text(&analysis_prompt)],
            )
            .map_err(|err| self.fail(Stage::StyleAnalysis, err))?
            .trim()
            .to_string();
        if style_description.is_empty() {
            return Err(PipelineError::stage(
                Stage::StyleAnalysis,
                "style analysis came back empty",
            ));
        }

        progress.report(2, "Generating model");
        let prompt = prompts::model_synthesis(&style_description);
        let image = self
            .provider
            .generate_image(&ImageRequest {
                model: &self.models.image,
                prompt: &prompt,
                references: vec![headshot],
                aspect_ratio: Some(AspectRatio::Portrait),
            })
            .map_err(|err| self.fail(Stage::ModelSynthesis, err))?;
        let stored = self
            .store
            .put_image("model", &image)
            .map_err(|err| self.fail(Stage::ModelSynthesis, err))?;

        Ok(ModelSession {
            current: image,
            current_ref: stored,
            style_description,
            history: vec![prompt],
        })
    }

    /// Applies one edit to the session's current image. The session is only
    /// touched once the edited image is stored.
    pub fn edit<'s>(
        &self,
        session: &'s mut ModelSession,
        instruction: &str,
    ) -> Result<&'s MediaRef, PipelineError> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(PipelineError::InvalidInput(
                "edit instruction is empty".to_string(),
            ));
        }
        let edited = self
            .provider
            .edit_image(&self.models.image, &session.current, instruction)
            .map_err(|err| self.fail(Stage::ModelEdit, err))?;
        let stored = self
            .store
            .put_image("model-edit", &edited)
            .map_err(|err| self.fail(Stage::ModelEdit, err))?;

        session.current = edited;
        session.current_ref = stored;
        session.history.push(instruction.to_string());
        self.log(
            "model_edited",
            json!({
                "edit": session.history.len() - 1,
                "instruction": instruction,
                "path": session.current_ref.path,
            }),
        );
        Ok(&session.current_ref)
    }

    fn fail(&self, stage: Stage, err: anyhow::Error) -> PipelineError {
        stage_failure(stage, err, self.credentials.as_deref())
    }

    fn log(&self, event_type: &str, payload: Value) {
        let _ = self.events.emit_value(event_type, payload);
    }
}
