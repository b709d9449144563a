use indexmap::IndexMap;

pub const CAP_TEXT: &str = "text";
pub const CAP_VISION: &str = "vision";
pub const CAP_IMAGE: &str = "image";
pub const CAP_EDIT: &str = "edit";
pub const CAP_VIDEO: &str = "video";
pub const CAP_SPEECH: &str = "speech";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

/// Known models in preference order; the first capable entry is the default.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    /// Same models, restricted to a single provider.
    pub fn for_provider(provider: &str) -> Self {
        let models = default_models()
            .into_iter()
            .filter(|(_, spec)| spec.provider == provider)
            .collect();
        Self { models }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: &str, capabilities: &[&str]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
            },
        );
    };

    insert("gemini-2.5-flash", "gemini", &[CAP_TEXT, CAP_VISION]);
    insert("gemini-2.5-pro", "gemini", &[CAP_TEXT, CAP_VISION]);
    insert("gemini-2.5-flash-image", "gemini", &[CAP_IMAGE, CAP_EDIT]);
    insert("gemini-3-pro-image-preview", "gemini", &[CAP_IMAGE, CAP_EDIT]);
    insert("veo-3.1-fast-generate-preview", "gemini", &[CAP_VIDEO]);
    insert("veo-3.1-generate-preview", "gemini", &[CAP_VIDEO]);
    insert("gemini-2.5-flash-preview-tts", "gemini", &[CAP_SPEECH]);
    insert("dryrun-text-1", "dryrun", &[CAP_TEXT, CAP_VISION]);
    insert("dryrun-image-1", "dryrun", &[CAP_IMAGE, CAP_EDIT]);
    insert("dryrun-video-1", "dryrun", &[CAP_VIDEO]);
    insert("dryrun-speech-1", "dryrun", &[CAP_SPEECH]);

    map
}
