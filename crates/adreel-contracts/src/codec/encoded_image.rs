use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::CodecError;

/// An image ready to be embedded in a provider request.
///
/// `payload` is standard base64 of the raw file bytes and `media_type` is
/// sniffed from those bytes, so the two always agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub payload: String,
    pub media_type: String,
}

impl EncodedImage {
    /// Encodes raw image bytes. `name_hint` is only consulted when the byte
    /// signature is not recognised.
    pub fn from_bytes(bytes: &[u8], name_hint: Option<&str>) -> Result<Self, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::EmptyImage);
        }
        let media_type = sniff_image_media_type(bytes)
            .or_else(|| name_hint.and_then(media_type_for_name))
            .unwrap_or("image/png");
        Ok(Self {
            payload: BASE64.encode(bytes),
            media_type: media_type.to_string(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, CodecError> {
        let bytes = std::fs::read(path).map_err(|source| CodecError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_bytes(&bytes, path.file_name().and_then(|name| name.to_str()))
    }

    /// Wraps a payload that is already base64, as returned by a provider.
    pub fn from_base64(payload: impl Into<String>, media_type: impl Into<String>) -> Result<Self, CodecError> {
        let payload = payload.into();
        if payload.trim().is_empty() {
            return Err(CodecError::EmptyImage);
        }
        Ok(Self {
            payload,
            media_type: media_type.into(),
        })
    }

    pub fn decode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(BASE64.decode(self.payload.trim().as_bytes())?)
    }
}

fn sniff_image_media_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}

pub fn media_type_for_name(name: &str) -> Option<&'static str> {
    let ext = Path::new(name)
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())?;
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" | "heif" => Some("image/heic"),
        _ => None,
    }
}

pub fn extension_for_media_type(media_type: &str) -> &'static str {
    let lowered = media_type.to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    if lowered.contains("mp4") {
        return "mp4";
    }
    if lowered.contains("wav") {
        return "wav";
    }
    if lowered.contains("heic") {
        return "heic";
    }
    if lowered.contains("json") {
        return "json";
    }
    if lowered.starts_with("image/") {
        return "png";
    }
    "bin"
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};

    use super::*;

    fn png_bytes() -> Vec<u8> {
        let image = RgbImage::from_pixel(4, 4, Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn sniffs_media_type_from_bytes_not_name() -> anyhow::Result<()> {
        let bytes = png_bytes();
        let encoded = EncodedImage::from_bytes(&bytes, Some("product.jpg"))?;
        assert_eq!(encoded.media_type, "image/png");
        assert_eq!(encoded.decode()?, bytes);
        Ok(())
    }

    #[test]
    fn falls_back_to_name_hint_for_unknown_signature() -> anyhow::Result<()> {
        let encoded = EncodedImage::from_bytes(b"not really an image", Some("shot.webp"))?;
        assert_eq!(encoded.media_type, "image/webp");
        Ok(())
    }

    #[test]
    fn empty_bytes_are_rejected() {
        assert!(matches!(
            EncodedImage::from_bytes(&[], Some("a.png")),
            Err(CodecError::EmptyImage)
        ));
        assert!(matches!(
            EncodedImage::from_base64("  ", "image/png"),
            Err(CodecError::EmptyImage)
        ));
    }

    #[test]
    fn from_path_reports_missing_file() {
        let err = EncodedImage::from_path(Path::new("/definitely/missing.png"))
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("/definitely/missing.png"));
    }

    #[test]
    fn extension_matches_media_type() {
        assert_eq!(extension_for_media_type("image/jpeg"), "jpg");
        assert_eq!(extension_for_media_type("video/mp4"), "mp4");
        assert_eq!(extension_for_media_type("audio/wav"), "wav");
        assert_eq!(extension_for_media_type("image/png"), "png");
        assert_eq!(extension_for_media_type("application/octet-stream"), "bin");
    }
}
