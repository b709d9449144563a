use std::fs;
use std::path::PathBuf;

use adreel_contracts::codec::{extension_for_media_type, EncodedImage};
use adreel_contracts::media::MediaRef;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Writes generated media into a run directory under content-hashed names.
/// Identical bytes of the same kind land on the same file.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn put(&self, kind: &str, bytes: &[u8], media_type: &str) -> Result<MediaRef> {
        let digest = Sha256::digest(bytes);
        let name = format!(
            "{kind}-{}.{}",
            hex::encode(&digest[..6]),
            extension_for_media_type(media_type)
        );
        let path = self.root.join(name);
        fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(MediaRef {
            path,
            media_type: media_type.to_string(),
            bytes: bytes.len() as u64,
        })
    }

    pub fn put_image(&self, kind: &str, image: &EncodedImage) -> Result<MediaRef> {
        let bytes = image
            .decode()
            .with_context(|| format!("failed to decode {kind} image"))?;
        self.put(kind, &bytes, &image.media_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_names_files_by_kind_and_content() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = MediaStore::new(temp.path().join("run"))?;

        let first = store.put("voiceover", b"RIFF....", "audio/wav")?;
        let again = store.put("voiceover", b"RIFF....", "audio/wav")?;
        let other = store.put("voiceover", b"RIFF!!!!", "audio/wav")?;

        assert_eq!(first, again);
        assert_ne!(first.path, other.path);
        assert_eq!(first.bytes, 8);
        let name = first
            .path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or_default()
            .to_string();
        assert!(name.starts_with("voiceover-"));
        assert!(name.ends_with(".wav"));
        assert_eq!(fs::read(&first.path)?, b"RIFF....");
        Ok(())
    }

    #[test]
    fn put_image_writes_decoded_bytes() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = MediaStore::new(temp.path())?;
        let image = EncodedImage {
            payload: "aGVsbG8=".to_string(),
            media_type: "image/jpeg".to_string(),
        };
        let stored = store.put_image("frame", &image)?;
        assert_eq!(fs::read(&stored.path)?, b"hello");
        assert!(stored.path.to_string_lossy().ends_with(".jpg"));
        assert!(stored.file_url().starts_with("file://"));
        Ok(())
    }
}
