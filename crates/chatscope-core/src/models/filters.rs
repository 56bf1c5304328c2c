use serde::{Deserialize, Serialize};

/// Structured search filters supplied by the UI state container.
/// Empty strings are treated like `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sender: Option<String>,
    pub chat: Option<String>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = non_empty(start.into());
        self.end_date = non_empty(end.into());
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = non_empty(sender.into());
        self
    }

    pub fn with_chat(mut self, chat: impl Into<String>) -> Self {
        self.chat = non_empty(chat.into());
        self
    }

    pub fn start_date(&self) -> Option<&str> {
        active(&self.start_date)
    }

    pub fn end_date(&self) -> Option<&str> {
        active(&self.end_date)
    }

    pub fn sender(&self) -> Option<&str> {
        active(&self.sender)
    }

    pub fn chat(&self) -> Option<&str> {
        active(&self.chat)
    }

    pub fn is_empty(&self) -> bool {
        self.start_date().is_none() && self.end_date().is_none() && self.sender().is_none() && self.chat().is_none()
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
