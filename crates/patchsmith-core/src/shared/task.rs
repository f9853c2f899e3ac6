use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::shared::response::ParsedResponse;

pub const TASK_STATE_FILE: &str = "task.json";

/// 保存済みタスク。モデルに再問い合わせせずに apply をやり直すための状態
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskState {
    pub task_description: String,
    pub parsed_response: ParsedResponse,
}

impl TaskState {
    pub async fn save(&self, task_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(task_dir)
            .await
            .with_context(|| format!("failed to create task directory {}", task_dir.display()))?;
        let path = task_dir.join(TASK_STATE_FILE);
        let body = serde_json::to_string_pretty(self)?;
        fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write task state {}", path.display()))?;
        Ok(path)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read task state {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to decode task state {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::response::{EditRecord, EditSource, FileStatus};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let state = TaskState {
            task_description: "rename the greeting".to_string(),
            parsed_response: ParsedResponse {
                file_list: vec!["hello.txt".to_string()],
                files: vec![EditRecord {
                    path: "hello.txt".to_string(),
                    status: FileStatus::New,
                    language: None,
                    source: EditSource::WholeFile {
                        content: "hi".to_string(),
                    },
                    explanation: None,
                }],
                git_branch_name: "feature/greeting".to_string(),
                git_commit_message: "feat: greeting".to_string(),
                summary: String::new(),
                potential_issues: String::new(),
            },
        };

        let path = state.save(&dir.path().join("task-1")).await.unwrap();
        let loaded = TaskState::load(&path).await.unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_load_missing_state_names_the_path() {
        let err = TaskState::load(Path::new("/nonexistent/task.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/task.json"));
    }
}
