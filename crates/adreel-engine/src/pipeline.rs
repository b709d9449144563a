use std::sync::Arc;
use std::thread;
use std::time::Duration;

use adreel_contracts::ads::{AdAssets, AdConcept, FinalOutput, QcOutcome, ValidationResult};
use adreel_contracts::brief::UserInput;
use adreel_contracts::codec::{pcm_to_wav, EncodedImage, PcmFormat};
use adreel_contracts::events::EventWriter;
use adreel_contracts::media::MediaRef;
use adreel_contracts::progress::ProgressEvent;
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::config::{EngineConfig, ResolvedModels};
use crate::credentials::CredentialManager;
use crate::error::{
    credential_lost, is_credential_message, stage_failure, PipelineError, Stage,
};
use crate::media_store::MediaStore;
use crate::prompts;
use crate::provider::{CapabilityProvider, ContentPart, ImageRequest, SpeechRequest, VideoRequest};
use crate::reporter::ProgressReporter;

pub const MAX_FRAME_ATTEMPTS: u8 = 3;

/// Runs the ad generation stages in order against one provider:
/// analysis, concept, opening frame with quality control, script, video,
/// optional voiceover and ad copy. Each run owns its state; nothing is shared
/// between runs apart from the provider and the output directory.
pub struct AdPipeline {
    provider: Arc<dyn CapabilityProvider>,
    store: MediaStore,
    events: EventWriter,
    credentials: Option<Arc<dyn CredentialManager>>,
    models: ResolvedModels,
    voice: String,
    poll_interval: Duration,
    max_poll_attempts: Option<u32>,
}

impl AdPipeline {
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
            voice: config.voice.clone(),
            poll_interval: config.video_poll_interval,
            max_poll_attempts: config.video_poll_max_attempts,
        })
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialManager>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn models(&self) -> &ResolvedModels {
        &self.models
    }

    /// Produces one ad package or the first unrecoverable error. The sink
    /// sees progress in non-decreasing step order followed by exactly one
    /// [`ProgressEvent::Idle`], on success and on failure.
    pub fn run(
        &self,
        input: &UserInput,
        mut on_progress: impl FnMut(ProgressEvent),
    ) -> Result<FinalOutput, PipelineError> {
        let mut progress = ProgressReporter::new(&self.events, &mut on_progress);
        self.log(
            "run_started",
            json!({
                "provider": self.provider.name(),
                "platform": input.platform.label(),
                "aspect_ratio": input.aspect_ratio.as_str(),
                "video_length_s": input.video_length_s,
                "voiceover": input.voiceover,
                "actor": input.actor_image.is_some(),
                "models": {
                    "text": self.models.text,
                    "image": self.models.image,
                    "video": self.models.video,
                    "speech": self.models.speech,
                },
                "model_fallbacks": self.models.fallbacks,
            }),
        );

        let result = self.run_stages(input, &mut progress);
        match &result {
            Ok(output) => self.log(
                "run_finished",
                json!({
                    "title": output.title,
                    "qc_passed": output.qc_passed,
                    "qc_attempts": output.qc_attempts,
                    "video": output.video_url.path,
                    "voiceover": output.voiceover_audio_url.as_ref().map(|media| &media.path),
                }),
            ),
            Err(err) => self.log("run_failed", json!({ "error": err.to_string() })),
        }
        progress.idle();
        result
    }

    fn run_stages(
        &self,
        input: &UserInput,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<FinalOutput, PipelineError> {
        let product = input.validate()?;

        let analysis = self.analyze_images(product, input.actor_image.as_ref(), progress)?;
        let mut concept = self.develop_concept(&analysis, input, progress)?;
        let (frame, qc) = self.produce_opening_frame(input, &mut concept, progress)?;
        let frame_ref = self.store_image(Stage::OpeningFrame, "opening-frame", &frame)?;
        let script = self.write_script(input, &concept, progress)?;
        let video_ref = self.render_video(input, &script, &frame, progress)?;
        let voiceover = if input.voiceover {
            Some(self.record_voiceover(input, progress)?)
        } else {
            None
        };
        let assets = self.write_ad_assets(input, progress)?;

        Ok(FinalOutput {
            title: concept.title,
            idea: concept.idea,
            description: concept.description,
            opening_frame_prompt: concept.opening_frame_prompt,
            platform: input.platform,
            aspect_ratio: input.aspect_ratio,
            tone: input.tone.clone(),
            opening_frame_url: frame_ref,
            script,
            video_url: video_ref,
            qc_report: qc.note(),
            qc_passed: qc.passed(),
            qc_attempts: qc.attempts(),
            ad_copy_variations: assets.ad_copy_variations,
            hashtags: assets.hashtags,
            voiceover_audio_url: voiceover,
        })
    }

    fn analyze_images(
        &self,
        product: &EncodedImage,
        actor: Option<&EncodedImage>,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<String, PipelineError> {
        progress.report(1, "Analyzing product image");
        let product_prompt = prompts::product_analysis();
        let mut analysis = self.describe_image(product, &product_prompt)?;

        if let Some(actor) = actor {
            progress.report(1, "Analyzing actor image");
            let actor_prompt = prompts::actor_analysis();
            let actor_analysis = self.describe_image(actor, &actor_prompt)?;
            analysis.push_str(prompts::ANALYSIS_SEPARATOR);
            analysis.push_str(&actor_analysis);
        }
        self.stage_completed(Stage::Analysis, json!({ "chars": analysis.chars().count() }));
        Ok(analysis)
    }

    fn describe_image(&self, image: &EncodedImage, prompt: &str) -> Result<String, PipelineError> {
        let text = self
            .provider
            .generate_text(
                &self.models.text,
                &[ContentPart::Image(image), ContentPart::Text(prompt)],
            )
            .map_err(|err| self.fail(Stage::Analysis, err))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::stage(Stage::Analysis, "analysis came back empty"));
        }
        Ok(text.to_string())
    }

    fn develop_concept(
        &self,
        analysis: &str,
        input: &UserInput,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<AdConcept, PipelineError> {
        progress.report(2, "Developing ad concept");
        let prompt = prompts::concept(analysis, input);
        let concept: AdConcept =
            self.structured(Stage::Concept, &[ContentPart::Text(&prompt)], &prompts::concept_schema())?;
        concept
            .ensure_complete()
            .map_err(|message| PipelineError::stage(Stage::Concept, message))?;
        self.stage_completed(Stage::Concept, json!({ "title": concept.title }));
        Ok(concept)
    }

    /// Generates and validates the opening frame up to
    /// [`MAX_FRAME_ATTEMPTS`] times. A rejected frame's suggestion is
    /// appended to the concept's frame prompt before the next attempt. When
    /// every attempt is rejected the last frame is kept and the outcome says so.
    fn produce_opening_frame(
        &self,
        input: &UserInput,
        concept: &mut AdConcept,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<(EncodedImage, QcOutcome), PipelineError> {
        let mut last_rejected: Option<(EncodedImage, String)> = None;

        for attempt in 1..=MAX_FRAME_ATTEMPTS {
            let step = if attempt == 1 { 3 } else { 4 };
            progress.report(
                step,
                format!("Generating opening frame (attempt {attempt}/{MAX_FRAME_ATTEMPTS})"),
            );
            let frame = self.generate_frame(input, &concept.opening_frame_prompt)?;

            progress.report(
                4,
                format!("Checking opening frame quality (attempt {attempt}/{MAX_FRAME_ATTEMPTS})"),
            );
            let verdict = self.validate_frame(&frame, input, &concept.opening_frame_prompt)?;
            self.log(
                "qc_verdict",
                json!({
                    "attempt": attempt,
                    "is_valid": verdict.is_valid,
                    "suggestion": verdict.suggestion,
                }),
            );

            if verdict.is_valid {
                let outcome = QcOutcome::Passed { attempt };
                self.stage_completed(Stage::OpeningFrame, json!({ "qc": outcome.note() }));
                return Ok((frame, outcome));
            }
            if attempt < MAX_FRAME_ATTEMPTS {
                concept.append_correction(attempt, &verdict.suggestion);
            }
            last_rejected = Some((frame, verdict.suggestion));
        }

        let Some((frame, last_suggestion)) = last_rejected else {
            return Err(PipelineError::stage(
                Stage::OpeningFrame,
                "no opening frame was produced",
            ));
        };
        let outcome = QcOutcome::Exhausted {
            attempts: MAX_FRAME_ATTEMPTS,
            last_suggestion,
        };
        self.stage_completed(Stage::OpeningFrame, json!({ "qc": outcome.note() }));
        Ok((frame, outcome))
    }

    fn generate_frame(
        &self,
        input: &UserInput,
        frame_prompt: &str,
    ) -> Result<EncodedImage, PipelineError> {
        let (prompt, references) = match input.actor_image.as_ref() {
            Some(actor) => (
                prompts::actor_frame(frame_prompt, input.aspect_ratio),
                vec![actor],
            ),
            None => (
                prompts::opening_frame(frame_prompt, input.aspect_ratio),
                Vec::new(),
            ),
        };
        self.provider
            .generate_image(&ImageRequest {
                model: &self.models.image,
                prompt: &prompt,
                references,
                aspect_ratio: Some(input.aspect_ratio),
            })
            .map_err(|err| self.fail(Stage::OpeningFrame, err))
    }

    fn validate_frame(
        &self,
        frame: &EncodedImage,
        input: &UserInput,
        frame_prompt: &str,
    ) -> Result<ValidationResult, PipelineError> {
        let prompt = prompts::frame_validation(frame_prompt, &input.description);
        self.structured(
            Stage::FrameValidation,
            &[ContentPart::Image(frame), ContentPart::Text(&prompt)],
            &prompts::validation_schema(),
        )
    }

    fn write_script(
        &self,
        input: &UserInput,
        concept: &AdConcept,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<String, PipelineError> {
        progress.report(5, "Writing video script");
        let prompt = prompts::video_script(input, concept);
        let script = self
            .provider
            .generate_text(&self.models.text, &[ContentPart::Text(&prompt)])
            .map_err(|err| self.fail(Stage::Script, err))?;
        let script = script.trim();
        if script.is_empty() {
            return Err(PipelineError::stage(Stage::Script, "script came back empty"));
        }
        self.stage_completed(Stage::Script, json!({ "chars": script.chars().count() }));
        Ok(script.to_string())
    }

    fn render_video(
        &self,
        input: &UserInput,
        script: &str,
        frame: &EncodedImage,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<MediaRef, PipelineError> {
        progress.report(6, "Submitting video job");
        let mut job = self
            .provider
            .submit_video(&VideoRequest {
                model: &self.models.video,
                prompt: script,
                image: frame,
                aspect_ratio: input.aspect_ratio,
            })
            .map_err(|err| self.fail(Stage::Video, err))?;

        let mut checks: u32 = 0;
        while !job.done {
            if let Some(max) = self.max_poll_attempts {
                if checks >= max {
                    return Err(PipelineError::stage(
                        Stage::Video,
                        format!("video job {} still running after {max} status checks", job.handle),
                    ));
                }
            }
            checks += 1;
            progress.report(
                6,
                format!("Rendering video, this can take a few minutes (check {checks})"),
            );
            thread::sleep(self.poll_interval);
            job = self
                .provider
                .poll_video(&job)
                .map_err(|err| self.fail(Stage::Video, err))?;
            self.log(
                "video_poll",
                json!({ "check": checks, "handle": job.handle, "done": job.done }),
            );
        }

        if let Some(message) = job.error {
            if is_credential_message(&message) {
                return Err(credential_lost(self.credentials.as_deref()));
            }
            return Err(PipelineError::VideoJobFailed(message));
        }
        let Some(uri) = job.video_uri else {
            return Err(PipelineError::VideoNoOutput);
        };

        progress.report(6, "Downloading video");
        let media = self
            .provider
            .download_video(&uri)
            .map_err(|err| self.fail(Stage::Video, err))?;
        let media_type = media.media_type.as_deref().unwrap_or("video/mp4");
        let video = self
            .store
            .put("video", &media.bytes, media_type)
            .map_err(|err| self.fail(Stage::Video, err))?;
        self.artifact_created("video", &video);
        self.stage_completed(Stage::Video, json!({ "checks": checks }));
        progress.report(6, "Video ready");
        Ok(video)
    }

    fn record_voiceover(
        &self,
        input: &UserInput,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<MediaRef, PipelineError> {
        progress.report(7, "Recording voiceover");
        let line = prompts::voiceover_line(&input.tone, &input.call_to_action);
        let pcm = self
            .provider
            .synthesize_speech(&SpeechRequest {
                model: &self.models.speech,
                text: &line,
                voice: &self.voice,
            })
            .map_err(|err| self.fail(Stage::Voiceover, err))?;
        if pcm.is_empty() {
            return Err(PipelineError::stage(Stage::Voiceover, "no audio was returned"));
        }
        let wav = pcm_to_wav(&pcm, PcmFormat::SPEECH)
            .map_err(|err| PipelineError::stage(Stage::Voiceover, err.to_string()))?;
        let audio = self
            .store
            .put("voiceover", &wav, "audio/wav")
            .map_err(|err| self.fail(Stage::Voiceover, err))?;
        self.artifact_created("voiceover", &audio);
        self.stage_completed(Stage::Voiceover, json!({ "pcm_bytes": pcm.len() }));
        Ok(audio)
    }

    fn write_ad_assets(
        &self,
        input: &UserInput,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<AdAssets, PipelineError> {
        progress.report(8, "Writing ad copy and hashtags");
        let prompt = prompts::ad_assets(input);
        let assets: AdAssets = self.structured(
            Stage::AdAssets,
            &[ContentPart::Text(&prompt)],
            &prompts::ad_assets_schema(),
        )?;
        let assets = assets
            .normalized()
            .map_err(|message| PipelineError::stage(Stage::AdAssets, message))?;
        self.stage_completed(Stage::AdAssets, json!({ "hashtags": assets.hashtags }));
        Ok(assets)
    }

    fn structured<T: DeserializeOwned>(
        &self,
        stage: Stage,
        parts: &[ContentPart<'_>],
        schema: &Value,
    ) -> Result<T, PipelineError> {
        let value = self
            .provider
            .generate_structured(&self.models.text, parts, schema)
            .map_err(|err| self.fail(stage, err))?;
        serde_json::from_value(value).map_err(|err| {
            PipelineError::stage(stage, format!("response did not match the expected shape: {err}"))
        })
    }

    fn store_image(
        &self,
        stage: Stage,
        kind: &str,
        image: &EncodedImage,
    ) -> Result<MediaRef, PipelineError> {
        let stored = self
            .store
            .put_image(kind, image)
            .map_err(|err| self.fail(stage, err))?;
        self.artifact_created(kind, &stored);
        Ok(stored)
    }

    fn fail(&self, stage: Stage, err: anyhow::Error) -> PipelineError {
        stage_failure(stage, err, self.credentials.as_deref())
    }

    fn stage_completed(&self, stage: Stage, detail: Value) {
        self.log(
            "stage_completed",
            json!({ "stage": stage.label(), "detail": detail }),
        );
    }

    fn artifact_created(&self, kind: &str, media: &MediaRef) {
        self.log(
            "artifact_created",
            json!({
                "kind": kind,
                "path": media.path,
                "media_type": media.media_type,
                "bytes": media.bytes,
            }),
        );
    }

    fn log(&self, event_type: &str, payload: Value) {
        // Telemetry failures never abort a run.
        let _ = self.events.emit_value(event_type, payload);
    }
}
