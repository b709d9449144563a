use std::fmt;

use adreel_contracts::brief::BriefError;

use crate::credentials::CredentialManager;

/// Message fragment the generative API uses when the key cannot see a
/// resource. Other not-found answers (retired models, stale operations)
/// do not carry it.
const ENTITY_NOT_FOUND_SIGNATURE: &str = "Requested entity was not found";
const STAGE_MESSAGE_MAX_CHARS: usize = 1024;

/// Structured error decoded from a provider's error body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{provider} request failed ({code} {status}): {message}")]
pub struct ApiError {
    pub provider: String,
    pub code: u16,
    pub status: String,
    pub message: String,
}

impl ApiError {
    /// The "entity not found" answer the service gives a key without access.
    pub fn is_entity_not_found(&self) -> bool {
        (self.status.eq_ignore_ascii_case("NOT_FOUND") || self.code == 404)
            && is_credential_message(&self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Analysis,
    Concept,
    OpeningFrame,
    FrameValidation,
    Script,
    Video,
    Voiceover,
    AdAssets,
    StyleAnalysis,
    ModelSynthesis,
    ModelEdit,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Analysis => "image analysis",
            Stage::Concept => "concept generation",
            Stage::OpeningFrame => "opening frame generation",
            Stage::FrameValidation => "opening frame validation",
            Stage::Script => "script generation",
            Stage::Video => "video generation",
            Stage::Voiceover => "voiceover",
            Stage::AdAssets => "ad asset generation",
            Stage::StyleAnalysis => "style analysis",
            Stage::ModelSynthesis => "model synthesis",
            Stage::ModelEdit => "model edit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{stage} failed: {message}")]
    Stage { stage: Stage, message: String },

    #[error("video generation failed: {0}")]
    VideoJobFailed(String),

    #[error("video generation completed but no output was returned")]
    VideoNoOutput,

    #[error("the API key is invalid or missing; select a key with access to the generation models and try again")]
    MissingCredential,
}

impl PipelineError {
    pub fn stage(stage: Stage, message: impl Into<String>) -> Self {
        PipelineError::Stage {
            stage,
            message: message.into(),
        }
    }
}

impl From<BriefError> for PipelineError {
    fn from(err: BriefError) -> Self {
        PipelineError::InvalidInput(err.to_string())
    }
}

/// True when the chain carries the "entity not found" API error, which the
/// service reports for keys that lack access. The message match is a
/// fallback for errors that never got decoded into an [`ApiError`].
pub fn is_credential_error(err: &anyhow::Error) -> bool {
    let structured = err.chain().any(|cause| {
        cause
            .downcast_ref::<ApiError>()
            .map(ApiError::is_entity_not_found)
            .unwrap_or(false)
    });
    structured || err
        .chain()
        .any(|cause| is_credential_message(&cause.to_string()))
}

/// Maps a provider failure in `stage` onto the public taxonomy. A rejected
/// credential is reported to the collaborator before it is returned.
pub(crate) fn stage_failure(
    stage: Stage,
    err: anyhow::Error,
    credentials: Option<&dyn CredentialManager>,
) -> PipelineError {
    if is_credential_error(&err) {
        return credential_lost(credentials);
    }
    PipelineError::stage(stage, error_chain_text(&err, STAGE_MESSAGE_MAX_CHARS))
}

pub(crate) fn credential_lost(credentials: Option<&dyn CredentialManager>) -> PipelineError {
    if let Some(credentials) = credentials {
        credentials.mark_unavailable();
    }
    PipelineError::MissingCredential
}

pub fn is_credential_message(message: &str) -> bool {
    message.contains(ENTITY_NOT_FOUND_SIGNATURE)
}

pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use anyhow::Context;

    use super::*;

    fn not_found() -> ApiError {
        ApiError {
            provider: "Gemini".to_string(),
            code: 404,
            status: "NOT_FOUND".to_string(),
            message: "Requested entity was not found.".to_string(),
        }
    }

    #[test]
    fn structured_not_found_is_a_credential_error() {
        let err = anyhow::Error::new(not_found()).context("video submission failed");
        assert!(is_credential_error(&err));
    }

    #[test]
    fn message_signature_is_a_credential_error() {
        let err = anyhow::anyhow!("upstream said: Requested entity was not found.");
        assert!(is_credential_error(&err));
    }

    #[test]
    fn other_api_errors_are_not_credential_errors() {
        let err = anyhow::Error::new(ApiError {
            provider: "Gemini".to_string(),
            code: 400,
            status: "INVALID_ARGUMENT".to_string(),
            message: "bad schema".to_string(),
        });
        assert!(!is_credential_error(&err));
    }

    struct FlagCredentials(AtomicBool);

    impl CredentialManager for FlagCredentials {
        fn has_active_credential(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }

        fn prompt_for_credential(&self) -> anyhow::Result<bool> {
            Ok(false)
        }

        fn mark_unavailable(&self) {
            self.0.store(false, Ordering::SeqCst);
        }
    }

    #[test]
    fn unknown_model_404_surfaces_as_stage_failure() {
        let credentials = FlagCredentials(AtomicBool::new(true));
        let message = "models/veo-3.1-fast-generate-preview is not found for API version v1beta, \
                       or is not supported for predictLongRunning.";
        let err = anyhow::Error::new(ApiError {
            provider: "Gemini".to_string(),
            code: 404,
            status: "NOT_FOUND".to_string(),
            message: message.to_string(),
        });

        assert!(!is_credential_error(&err));
        match stage_failure(Stage::Video, err, Some(&credentials)) {
            PipelineError::Stage { stage, message: text } => {
                assert_eq!(stage, Stage::Video);
                assert!(text.contains("is not found for API version v1beta"));
            }
            other => panic!("expected a stage failure, got {other:?}"),
        }
        assert!(credentials.has_active_credential());
    }

    #[test]
    fn entity_not_found_404_marks_credential_unavailable() {
        let credentials = FlagCredentials(AtomicBool::new(true));
        let err = anyhow::Error::new(not_found()).context("video submission failed");
        assert_eq!(
            stage_failure(Stage::Video, err, Some(&credentials)),
            PipelineError::MissingCredential
        );
        assert!(!credentials.has_active_credential());
    }

    #[test]
    fn error_chain_text_preserves_nested_contexts() {
        let err = Err::<(), _>(anyhow::anyhow!("socket closed"))
            .context("Gemini request failed")
            .context("concept generation")
            .err()
            .unwrap_or_else(|| anyhow::anyhow!("missing"));
        assert_eq!(
            error_chain_text(&err, 512),
            "concept generation | caused by: Gemini request failed | caused by: socket closed"
        );
        assert_eq!(error_chain_text(&err, 7), "concept…");
    }

    #[test]
    fn brief_errors_become_invalid_input() {
        let err = PipelineError::from(BriefError::MissingProductImage);
        assert_eq!(
            err,
            PipelineError::InvalidInput("a product image is required".to_string())
        );
    }
}
