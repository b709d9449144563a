use std::fmt;

use serde::Serialize;

/// Number of progress steps reported by the ad pipeline.
pub const TOTAL_STEPS: u8 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub step: u8,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(step: u8, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProgressUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.step, TOTAL_STEPS, self.message)
    }
}

/// What a progress sink receives. Every run ends with exactly one `Idle`,
/// whether it succeeded or failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Step(ProgressUpdate),
    Idle,
}

impl ProgressEvent {
    pub fn update(&self) -> Option<&ProgressUpdate> {
        match self {
            ProgressEvent::Step(update) => Some(update),
            ProgressEvent::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_step_fraction() {
        let update = ProgressUpdate::new(6, "Rendering video (check 2)");
        assert_eq!(update.to_string(), "[6/8] Rendering video (check 2)");
        assert_eq!(ProgressEvent::Step(update.clone()).update(), Some(&update));
        assert_eq!(ProgressEvent::Idle.update(), None);
    }
}
