use std::thread;
use std::time::Duration;

use adreel_contracts::codec::EncodedImage;
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Map, Value};

use crate::config::{non_empty_env, EngineConfig};
use crate::error::{truncate_text, ApiError};
use crate::provider::{
    CapabilityProvider, ContentPart, DownloadedMedia, ImageRequest, SpeechRequest, VideoJob,
    VideoRequest,
};

const PROVIDER: &str = "Gemini";
const CONNECT_RETRIES: usize = 2;
const RETRY_BACKOFF_S: f64 = 1.2;
const VIDEO_SAMPLE_POINTER: &str = "/response/generateVideoResponse/generatedSamples/0/video/uri";

/// Binding for the Gemini REST API (`generateContent`, `predictLongRunning`
/// and operation polling). The key travels as the `key` query parameter.
pub struct GeminiProvider {
    api_base: String,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base: config.api_base.trim().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn api_key() -> Result<String> {
        non_empty_env("GEMINI_API_KEY")
            .or_else(|| non_empty_env("GOOGLE_API_KEY"))
            .context("GEMINI_API_KEY or GOOGLE_API_KEY not set")
    }

    fn endpoint_for_model(&self, model: &str, method: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:{}", self.api_base, model_path, method)
    }

    fn post_json(&self, endpoint: &str, payload: &Value) -> Result<Value> {
        let api_key = Self::api_key()?;
        for attempt in 0..=CONNECT_RETRIES {
            let response = self
                .http
                .post(endpoint)
                .query(&[("key", api_key.as_str())])
                .json(payload)
                .send();
            match response {
                Ok(ok) => return response_json_or_error(PROVIDER, ok),
                Err(raw) => {
                    // Only retry when the request never reached the service.
                    let retryable = raw.is_connect();
                    let err = anyhow::Error::new(raw.without_url())
                        .context(format!("{PROVIDER} request failed ({endpoint})"));
                    if !retryable || attempt >= CONNECT_RETRIES {
                        return Err(err);
                    }
                    thread::sleep(Duration::from_secs_f64(
                        RETRY_BACKOFF_S * (attempt as f64 + 1.0),
                    ));
                }
            }
        }
        bail!("{PROVIDER} request to {endpoint} was never sent")
    }

    fn get(&self, url: &str) -> Result<HttpResponse> {
        let api_key = Self::api_key()?;
        self.http
            .get(url)
            .query(&[("key", api_key.as_str())])
            .send()
            .map_err(|raw| anyhow::Error::new(raw.without_url()))
            .with_context(|| format!("{PROVIDER} request failed ({})", strip_query(url)))
    }

    fn generate_content(&self, model: &str, payload: &Value) -> Result<Value> {
        let endpoint = self.endpoint_for_model(model, "generateContent");
        self.post_json(&endpoint, payload)
    }
}

impl CapabilityProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_text(&self, model: &str, parts: &[ContentPart<'_>]) -> Result<String> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": parts_payload(parts) }],
        });
        let response = self.generate_content(model, &payload)?;
        extract_text(&response)
    }

    fn generate_structured(
        &self,
        model: &str,
        parts: &[ContentPart<'_>],
        schema: &Value,
    ) -> Result<Value> {
        let payload = structured_payload(parts, schema);
        let response = self.generate_content(model, &payload)?;
        let text = extract_text(&response)?;
        serde_json::from_str(strip_json_fence(&text))
            .with_context(|| format!("{PROVIDER} returned invalid JSON: {}", truncate_text(&text, 256)))
    }

    fn generate_image(&self, request: &ImageRequest<'_>) -> Result<EncodedImage> {
        let payload = image_payload(request);
        let response = self.generate_content(request.model, &payload)?;
        let Some((data, media_type)) = extract_inline_data(&response) else {
            bail!("{PROVIDER} returned no image{}", finish_reason_suffix(&response));
        };
        Ok(EncodedImage::from_base64(data, media_type.unwrap_or("image/png"))?)
    }

    fn edit_image(
        &self,
        model: &str,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<EncodedImage> {
        self.generate_image(&ImageRequest {
            model,
            prompt: instruction,
            references: vec![image],
            aspect_ratio: None,
        })
    }

    fn submit_video(&self, request: &VideoRequest<'_>) -> Result<VideoJob> {
        let endpoint = self.endpoint_for_model(request.model, "predictLongRunning");
        let response = self.post_json(&endpoint, &video_payload(request))?;
        parse_operation(&response, None)
    }

    fn poll_video(&self, job: &VideoJob) -> Result<VideoJob> {
        let url = format!("{}/{}", self.api_base, job.handle.trim_start_matches('/'));
        let response = response_json_or_error(PROVIDER, self.get(&url)?)?;
        parse_operation(&response, Some(&job.handle))
    }

    fn download_video(&self, uri: &str) -> Result<DownloadedMedia> {
        let response = self.get(uri)?;
        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = response.text().unwrap_or_default();
            if let Some(api_error) = decode_api_error(PROVIDER, code, &body) {
                return Err(anyhow::Error::new(api_error));
            }
            bail!(
                "{PROVIDER} video download failed ({code}): {}",
                truncate_text(&body, 512)
            );
        }
        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
            .filter(|value| !value.is_empty());
        let bytes = response
            .bytes()
            .with_context(|| format!("{PROVIDER} video body read failed"))?
            .to_vec();
        if bytes.is_empty() {
            bail!("{PROVIDER} video download returned an empty body");
        }
        Ok(DownloadedMedia { bytes, media_type })
    }

    fn synthesize_speech(&self, request: &SpeechRequest<'_>) -> Result<Vec<u8>> {
        let response = self.generate_content(request.model, &speech_payload(request))?;
        let Some((data, _)) = extract_inline_data(&response) else {
            bail!("{PROVIDER} returned no audio{}", finish_reason_suffix(&response));
        };
        BASE64
            .decode(data.as_bytes())
            .context("Gemini audio base64 decode failed")
    }
}

fn parts_payload(parts: &[ContentPart<'_>]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => json!({ "text": text }),
            ContentPart::Image(image) => inline_image(image),
        })
        .collect()
}

fn inline_image(image: &EncodedImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.media_type,
            "data": image.payload,
        }
    })
}

fn structured_payload(parts: &[ContentPart<'_>], schema: &Value) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": parts_payload(parts) }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": schema,
        },
    })
}

fn image_payload(request: &ImageRequest<'_>) -> Value {
    let mut parts: Vec<Value> = request
        .references
        .iter()
        .map(|image| inline_image(image))
        .collect();
    parts.push(json!({ "text": request.prompt }));

    let mut generation_config = Map::new();
    generation_config.insert("responseModalities".to_string(), json!(["IMAGE"]));
    if let Some(aspect_ratio) = request.aspect_ratio {
        generation_config.insert(
            "imageConfig".to_string(),
            json!({ "aspectRatio": aspect_ratio.as_str() }),
        );
    }
    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": Value::Object(generation_config),
    })
}

fn video_payload(request: &VideoRequest<'_>) -> Value {
    json!({
        "instances": [{
            "prompt": request.prompt,
            "image": {
                "bytesBase64Encoded": request.image.payload,
                "mimeType": request.image.media_type,
            },
        }],
        "parameters": {
            "aspectRatio": request.aspect_ratio.as_str(),
            "resolution": "720p",
        },
    })
}

fn speech_payload(request: &SpeechRequest<'_>) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": request.text }] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": request.voice },
                },
            },
        },
    })
}

fn candidate_parts(response: &Value) -> Vec<&Value> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|candidate| candidate.pointer("/content/parts").and_then(Value::as_array))
        .flatten()
        .collect()
}

fn extract_text(response: &Value) -> Result<String> {
    let text = candidate_parts(response)
        .into_iter()
        .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<&str>>()
        .join("");
    if text.trim().is_empty() {
        bail!("{PROVIDER} returned no text{}", finish_reason_suffix(response));
    }
    Ok(text)
}

fn extract_inline_data(response: &Value) -> Option<(&str, Option<&str>)> {
    candidate_parts(response).into_iter().find_map(|part| {
        let inline = part.get("inlineData").or_else(|| part.get("inline_data"))?;
        let data = inline.get("data").and_then(Value::as_str)?;
        if data.is_empty() {
            return None;
        }
        let media_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str);
        Some((data, media_type))
    })
}

fn finish_reason_suffix(response: &Value) -> String {
    let block = response
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str);
    let finish = response
        .pointer("/candidates/0/finishReason")
        .and_then(Value::as_str);
    match (block, finish) {
        (Some(reason), _) => format!(" (blocked: {reason})"),
        (None, Some(reason)) => format!(" (finishReason: {reason})"),
        (None, None) => String::new(),
    }
}

fn parse_operation(response: &Value, previous_handle: Option<&str>) -> Result<VideoJob> {
    let handle = response
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or(previous_handle)
        .context("Gemini video operation has no name")?
        .to_string();
    let done = response.get("done").and_then(Value::as_bool).unwrap_or(false);
    let video_uri = response
        .pointer(VIDEO_SAMPLE_POINTER)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let mut error = response.get("error").map(|error| {
        error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string())
    });
    if done && error.is_none() && video_uri.is_none() {
        let filtered = response
            .pointer("/response/generateVideoResponse/raiMediaFilteredReasons")
            .and_then(Value::as_array)
            .map(|reasons| {
                reasons
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<&str>>()
                    .join("; ")
            })
            .filter(|reasons| !reasons.is_empty());
        if let Some(reasons) = filtered {
            error = Some(format!("video was filtered: {reasons}"));
        }
    }
    Ok(VideoJob {
        handle,
        done,
        video_uri,
        error,
    })
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        if let Some(api_error) = decode_api_error(provider, code, &body) {
            return Err(anyhow::Error::new(api_error));
        }
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn decode_api_error(provider: &str, http_code: u16, body: &str) -> Option<ApiError> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    let error = parsed.get("error")?;
    let code = error
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|value| u16::try_from(value).ok())
        .unwrap_or(http_code);
    let status = error
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| truncate_text(body, 512));
    Some(ApiError {
        provider: provider.to_string(),
        code,
        status,
        message,
    })
}

fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use adreel_contracts::brief::AspectRatio;

    use super::*;

    fn frame() -> EncodedImage {
        EncodedImage {
            payload: "aGVsbG8=".to_string(),
            media_type: "image/png".to_string(),
        }
    }

    #[test]
    fn endpoint_accepts_bare_and_prefixed_models() -> anyhow::Result<()> {
        let provider = GeminiProvider::new(&EngineConfig {
            api_base: "https://example.test/v1beta/".to_string(),
            ..EngineConfig::default()
        })?;
        assert_eq!(
            provider.endpoint_for_model("gemini-2.5-flash", "generateContent"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            provider.endpoint_for_model("models/veo-3.1-generate-preview", "predictLongRunning"),
            "https://example.test/v1beta/models/veo-3.1-generate-preview:predictLongRunning"
        );
        Ok(())
    }

    #[test]
    fn image_payload_puts_references_before_prompt() {
        let actor = frame();
        let payload = image_payload(&ImageRequest {
            model: "gemini-2.5-flash-image",
            prompt: "Actor holding the bottle",
            references: vec![&actor],
            aspect_ratio: Some(AspectRatio::Portrait),
        });
        let parts = payload["contents"][0]["parts"].as_array().cloned().unwrap_or_default();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/png"));
        assert_eq!(parts[1]["text"], json!("Actor holding the bottle"));
        assert_eq!(
            payload["generationConfig"]["imageConfig"]["aspectRatio"],
            json!("9:16")
        );
        assert_eq!(payload["generationConfig"]["responseModalities"], json!(["IMAGE"]));
    }

    #[test]
    fn speech_and_video_payloads_use_service_field_names() {
        let speech = speech_payload(&SpeechRequest {
            model: "gemini-2.5-flash-preview-tts",
            text: "say with a calm tone: Shop now",
            voice: "Kore",
        });
        assert_eq!(
            speech.pointer("/generationConfig/speechConfig/voiceConfig/prebuiltVoiceConfig/voiceName"),
            Some(&json!("Kore"))
        );
        let image = frame();
        let video = video_payload(&VideoRequest {
            model: "veo-3.1-fast-generate-preview",
            prompt: "0-3s: open on the bottle",
            image: &image,
            aspect_ratio: AspectRatio::Landscape,
        });
        assert_eq!(video["instances"][0]["image"]["bytesBase64Encoded"], json!("aGVsbG8="));
        assert_eq!(video["parameters"]["aspectRatio"], json!("16:9"));
    }

    #[test]
    fn structured_payload_requests_json() {
        let schema = json!({ "type": "OBJECT" });
        let payload = structured_payload(&[ContentPart::Text("concept")], &schema);
        assert_eq!(
            payload["generationConfig"]["responseMimeType"],
            json!("application/json")
        );
        assert_eq!(payload["generationConfig"]["responseSchema"], schema);
    }

    #[test]
    fn extract_text_skips_thoughts_and_reports_blocks() {
        let response = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "thinking", "thought": true },
                    { "text": "Hello " },
                    { "text": "world" },
                ]},
            }],
        });
        assert_eq!(extract_text(&response).ok().as_deref(), Some("Hello world"));

        let blocked = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let message = extract_text(&blocked).err().map(|err| err.to_string()).unwrap_or_default();
        assert_eq!(message, "Gemini returned no text (blocked: SAFETY)");
    }

    #[test]
    fn inline_data_accepts_both_casings() {
        let response = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "here you go" },
                { "inline_data": { "mime_type": "image/jpeg", "data": "abcd" } },
            ]}}],
        });
        assert_eq!(extract_inline_data(&response), Some(("abcd", Some("image/jpeg"))));
    }

    #[test]
    fn parse_operation_reads_pending_done_and_failed_jobs() -> anyhow::Result<()> {
        let pending = parse_operation(&json!({ "name": "models/veo/operations/42" }), None)?;
        assert_eq!(pending, VideoJob::pending("models/veo/operations/42"));

        let done = parse_operation(
            &json!({
                "done": true,
                "response": { "generateVideoResponse": { "generatedSamples": [
                    { "video": { "uri": "https://example.test/files/abc:download?alt=media" } }
                ]}},
            }),
            Some("models/veo/operations/42"),
        )?;
        assert!(done.done);
        assert_eq!(done.handle, "models/veo/operations/42");
        assert_eq!(
            done.video_uri.as_deref(),
            Some("https://example.test/files/abc:download?alt=media")
        );

        let failed = parse_operation(
            &json!({ "name": "op", "done": true, "error": { "code": 3, "message": "prompt rejected" } }),
            None,
        )?;
        assert_eq!(failed.error.as_deref(), Some("prompt rejected"));

        let filtered = parse_operation(
            &json!({ "name": "op", "done": true, "response": { "generateVideoResponse": {
                "raiMediaFilteredReasons": ["celebrity likeness"]
            }}}),
            None,
        )?;
        assert_eq!(filtered.error.as_deref(), Some("video was filtered: celebrity likeness"));
        Ok(())
    }

    #[test]
    fn api_error_body_is_decoded() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#;
        let decoded = decode_api_error("Gemini", 404, body);
        assert_eq!(
            decoded,
            Some(ApiError {
                provider: "Gemini".to_string(),
                code: 404,
                status: "NOT_FOUND".to_string(),
                message: "Requested entity was not found.".to_string(),
            })
        );
        assert_eq!(decode_api_error("Gemini", 502, "<html>bad gateway</html>"), None);
    }

    #[test]
    fn json_fences_are_stripped() {
        assert_eq!(strip_json_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_query("https://x.test/file?alt=media&key=k"), "https://x.test/file");
    }
}
