//! User-visible notices
//!
//! Failures surface here in addition to the log. Notices accumulate until
//! explicitly cleared instead of flashing past.

use serde::{Deserialize, Serialize};

/// One human-readable notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Text shown to the user
    pub text: String,
    /// Supersedes every notice posted before it
    pub replace: bool,
}

impl Notice {
    /// Notice appended to the board
    pub fn append(text: impl Into<String>) -> Self {
        Self { text: text.into(), replace: false }
    }

    /// Notice that clears the board before being posted
    pub fn replace(text: impl Into<String>) -> Self {
        Self { text: text.into(), replace: true }
    }
}

/// Accumulated notices, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeBoard {
    notices: Vec<String>,
}

impl NoticeBoard {
    /// Post a notice; identical texts are kept once
    pub fn post(&mut self, notice: Notice) {
        if notice.replace {
            self.notices.clear();
        } else if self.notices.contains(&notice.text) {
            return;
        }
        self.notices.push(notice.text);
    }

    /// Current notices, oldest first
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    /// Drop every notice
    pub fn clear(&mut self) {
        self.notices.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}
