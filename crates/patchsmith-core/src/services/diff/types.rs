use serde::{Deserialize, Serialize};

/// Outcome of one search/replace block against a file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockOutcome {
    pub index: usize,
    pub applied: bool,
    pub note: Option<String>,
}

/// Result of resolving every block of one record against the current content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedEdit {
    pub content: String,
    pub outcomes: Vec<BlockOutcome>,
}

impl ResolvedEdit {
    pub fn skipped_blocks(&self) -> impl Iterator<Item = &BlockOutcome> {
        self.outcomes.iter().filter(|o| !o.applied)
    }
}
