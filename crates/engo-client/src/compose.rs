//! The text being typed and any correction offered for it.
//!
//! Nothing here is persisted. A screen keeps one [`ComposeState`] per open
//! conversation and feeds every [`SendOutcome`] back into it.

use crate::pipeline::SendOutcome;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeState {
    text: String,
    suggestion: Option<String>,
}

impl ComposeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    /// Replace the typed text. A pending suggestion no longer matches it, so
    /// it is cleared.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.suggestion = None;
    }

    pub fn can_send(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Update after a send attempt on the current text.
    pub fn apply(&mut self, outcome: &SendOutcome) {
        match outcome {
            SendOutcome::Sent(_) => {
                self.text.clear();
                self.suggestion = None;
            }
            SendOutcome::NeedsRevision(s) => self.suggestion = Some(s.clone()),
            // Keep the text so the user can retry.
            SendOutcome::Failed(_) | SendOutcome::PartialWrite { .. } => self.suggestion = None,
            SendOutcome::Rejected(_) => {}
        }
    }

    /// Use the suggestion as the new text. Returns false if there was none.
    pub fn accept_suggestion(&mut self) -> bool {
        match self.suggestion.take() {
            Some(s) => {
                self.text = s;
                true
            }
            None => false,
        }
    }

    pub fn dismiss_suggestion(&mut self) {
        self.suggestion = None;
    }
}
