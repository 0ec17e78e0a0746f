use serde::{Deserialize, Serialize};

/// Shared state of one verified-article run.
///
/// `report` is written by research, `article` by the writer, and the
/// remaining fields by the validation router.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleState {
    pub report: String,
    pub article: String,
    pub valid: bool,
    pub feedback: Option<String>,
    /// Number of editor reviews so far; never decreases
    pub retry_count: u32,
}

impl ArticleState {
    pub fn feedback_present(&self) -> bool {
        self.feedback
            .as_deref()
            .map(|feedback| !feedback.trim().is_empty())
            .unwrap_or(false)
    }
}
