use std::io::Cursor;

use adreel_contracts::brief::AspectRatio;
use adreel_contracts::codec::{EncodedImage, PcmFormat};
use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::provider::{
    CapabilityProvider, ContentPart, DownloadedMedia, ImageRequest, SpeechRequest, VideoJob,
    VideoRequest,
};

const DRYRUN_CHARS_PER_SECOND: usize = 16;

/// Offline provider: solid-color frames, schema-shaped JSON, a JSON stand-in
/// for the video and PCM silence. Output is a pure function of the inputs.
pub struct DryrunProvider;

impl CapabilityProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_text(&self, model: &str, parts: &[ContentPart<'_>]) -> Result<String> {
        let prompt = prompt_text(parts);
        let images = parts
            .iter()
            .filter(|part| matches!(part, ContentPart::Image(_)))
            .count();
        Ok(format!(
            "Dry-run {model} response ({images} image(s)) to: {}",
            first_line(&prompt, 120)
        ))
    }

    fn generate_structured(
        &self,
        _model: &str,
        parts: &[ContentPart<'_>],
        schema: &Value,
    ) -> Result<Value> {
        let seed = short_id(&prompt_text(parts));
        Ok(fill_schema(schema, "value", 0, &seed))
    }

    fn generate_image(&self, request: &ImageRequest<'_>) -> Result<EncodedImage> {
        let (width, height) = match request.aspect_ratio {
            Some(AspectRatio::Portrait) => (288, 512),
            Some(AspectRatio::Landscape) => (512, 288),
            None => (384, 384),
        };
        let mut seed = request.prompt.to_string();
        for reference in &request.references {
            seed.push_str(&reference.payload);
        }
        solid_png(width, height, &seed)
    }

    fn edit_image(
        &self,
        _model: &str,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<EncodedImage> {
        let (width, height) = image
            .decode()
            .ok()
            .and_then(|bytes| image::load_from_memory(&bytes).ok())
            .map(|decoded| (decoded.width(), decoded.height()))
            .unwrap_or((384, 384));
        solid_png(width, height, &format!("{}{instruction}", image.payload))
    }

    fn submit_video(&self, request: &VideoRequest<'_>) -> Result<VideoJob> {
        let id = short_id(&format!("{}{}", request.prompt, request.image.payload));
        Ok(VideoJob::pending(format!("dryrun/operations/{id}")))
    }

    fn poll_video(&self, job: &VideoJob) -> Result<VideoJob> {
        let id = job.handle.rsplit('/').next().unwrap_or(job.handle.as_str());
        Ok(VideoJob {
            handle: job.handle.clone(),
            done: true,
            video_uri: Some(format!("dryrun://video/{id}")),
            error: None,
        })
    }

    fn download_video(&self, uri: &str) -> Result<DownloadedMedia> {
        let manifest = json!({
            "kind": "dryrun-video",
            "uri": uri,
        });
        Ok(DownloadedMedia {
            bytes: serde_json::to_vec_pretty(&manifest)?,
            media_type: Some("application/json".to_string()),
        })
    }

    fn synthesize_speech(&self, request: &SpeechRequest<'_>) -> Result<Vec<u8>> {
        let seconds = (request.text.chars().count() / DRYRUN_CHARS_PER_SECOND).max(1);
        let format = PcmFormat::SPEECH;
        Ok(vec![0u8; seconds * format.byte_rate()? as usize])
    }
}

fn prompt_text(parts: &[ContentPart<'_>]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text(text) => Some(*text),
            ContentPart::Image(_) => None,
        })
        .collect::<Vec<&str>>()
        .join("\n")
}

fn first_line(text: &str, max_chars: usize) -> String {
    let line = text.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
    line.trim().chars().take(max_chars).collect()
}

/// Builds a value shaped like `schema` (OpenAPI subset with upper-case type
/// names). Arrays get `minItems` entries.
fn fill_schema(schema: &Value, key: &str, index: usize, seed: &str) -> Value {
    let kind = schema
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("STRING")
        .to_ascii_uppercase();
    match kind.as_str() {
        "OBJECT" => {
            let mut out = Map::new();
            if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                for (name, property) in properties {
                    out.insert(name.clone(), fill_schema(property, name, 0, seed));
                }
            }
            Value::Object(out)
        }
        "ARRAY" => {
            let count = schema_count(schema.get("minItems")).unwrap_or(1);
            let items = schema.get("items").cloned().unwrap_or(Value::Null);
            Value::Array(
                (1..=count)
                    .map(|idx| fill_schema(&items, key, idx, seed))
                    .collect(),
            )
        }
        "BOOLEAN" => Value::Bool(true),
        "INTEGER" | "NUMBER" => json!(index.max(1)),
        _ => Value::String(dryrun_string(key, index, seed)),
    }
}

fn dryrun_string(key: &str, index: usize, seed: &str) -> String {
    let lowered = key.to_ascii_lowercase();
    if lowered.contains("hashtag") {
        return format!("#dryrun{index}");
    }
    if lowered == "suggestion" {
        return String::new();
    }
    if index > 0 {
        return format!("Dry-run {key} {index} ({seed})");
    }
    format!("Dry-run {key} ({seed})")
}

// The Gemini schema dialect encodes int64 bounds as strings.
fn schema_count(value: Option<&Value>) -> Option<usize> {
    let value = value?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|raw| raw.trim().parse::<u64>().ok()))
        .map(|count| count as usize)
}

fn solid_png(width: u32, height: u32, seed: &str) -> Result<EncodedImage> {
    let (r, g, b) = color_from_prompt(seed);
    let image = RgbImage::from_pixel(width, height, Rgb([r, g, b]));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .context("failed to encode dry-run frame")?;
    Ok(EncodedImage::from_bytes(&out.into_inner(), None)?)
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let digest = Sha256::digest(prompt.as_bytes());
    (digest[0], digest[1], digest[2])
}

fn short_id(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    hex::encode(&digest[..4])
}
