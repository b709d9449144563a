use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A generated artifact stored on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub path: PathBuf,
    pub media_type: String,
    pub bytes: u64,
}

impl MediaRef {
    pub fn file_url(&self) -> String {
        let absolute = std::fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone());
        format!("file://{}", absolute.display())
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.media_type)
    }
}
