use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use crate::config::non_empty_env;

const KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Host-side owner of the API credential. The engine never reads the
/// environment for this; it only reports when the service rejected the key.
pub trait CredentialManager: Send + Sync {
    fn has_active_credential(&self) -> bool;

    /// Asks the host to supply a credential. Returns whether one is now active.
    fn prompt_for_credential(&self) -> Result<bool>;

    fn mark_unavailable(&self);
}

/// Credential backed by `GEMINI_API_KEY` / `GOOGLE_API_KEY`.
#[derive(Debug)]
pub struct EnvCredentialManager {
    available: AtomicBool,
}

impl EnvCredentialManager {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(Self::key_present()),
        }
    }

    fn key_present() -> bool {
        KEY_VARS.iter().any(|key| non_empty_env(key).is_some())
    }
}

impl Default for EnvCredentialManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialManager for EnvCredentialManager {
    fn has_active_credential(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// A terminal host cannot open a picker; re-reading the environment picks
    /// up a key exported since start-up.
    fn prompt_for_credential(&self) -> Result<bool> {
        let present = Self::key_present();
        self.available.store(present, Ordering::SeqCst);
        Ok(present)
    }

    fn mark_unavailable(&self) {
        self.available.store(false, Ordering::SeqCst);
    }
}
