use anyhow::Result;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::prompts::build_task_prompt;
use crate::services::anthropic::{MessageCallback, ModelClient};
use crate::services::apply::{ApplyReport, ChangeApplicator};
use crate::services::response::{parse_response, sanitize_branch_name};
use crate::services::workspace::WorkspaceScanner;
use crate::shared::config::Settings;
use crate::shared::logging::InteractionLog;
use crate::shared::response::ParsedResponse;
use crate::shared::task::TaskState;

/// 1タスク分のオーケストレータ。scan → prompt → generate → parse → apply を束ねる
#[derive(Debug)]
pub struct Session {
    task_id: String,
    workspace_path: PathBuf,
    settings: Settings,
    interaction_log: InteractionLog,
}

impl Session {
    pub fn new(workspace_path: PathBuf, settings: Settings) -> Self {
        let task_id = Uuid::new_v4().to_string();
        let interaction_log = if settings.interaction_logging {
            InteractionLog::new(
                workspace_path
                    .join(".patchsmith")
                    .join(&task_id)
                    .join("logs"),
            )
        } else {
            InteractionLog::disabled()
        };
        Self {
            task_id,
            workspace_path,
            settings,
            interaction_log,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn workspace_path(&self) -> &Path {
        &self.workspace_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn task_dir(&self) -> PathBuf {
        self.workspace_path.join(".patchsmith").join(&self.task_id)
    }

    pub fn build_prompt(&self, task: &str) -> Result<String> {
        let scanner = WorkspaceScanner::new(&self.workspace_path, &self.settings);
        let files = scanner.scan()?;
        tracing::info!("scanned {} files under {}", files.len(), self.workspace_path.display());
        Ok(build_task_prompt(task, &files))
    }

    pub fn parse(&self, response_text: &str) -> ParsedResponse {
        parse_response(response_text, &self.interaction_log)
    }

    pub async fn persist(&self, task: &str, parsed: &ParsedResponse) -> Result<PathBuf> {
        let state = TaskState {
            task_description: task.to_string(),
            parsed_response: parsed.clone(),
        };
        let path = state.save(&self.task_dir()).await?;
        tracing::info!("task state saved to {}", path.display());
        Ok(path)
    }

    pub async fn apply(&self, parsed: &ParsedResponse, dry_run: bool) -> Result<ApplyReport> {
        let applicator = ChangeApplicator::new(
            &self.workspace_path,
            dry_run,
            Some(self.settings.report_threshold),
        );
        applicator.apply_all(&parsed.files, &self.interaction_log).await
    }

    /// ブランチ名。応答に無ければ生成したフォールバック名を使う
    pub fn branch_name(&self, parsed: &ParsedResponse) -> String {
        if parsed.git_branch_name.is_empty() {
            sanitize_branch_name("")
        } else {
            parsed.git_branch_name.clone()
        }
    }

    pub async fn run_task(
        &self,
        client: &dyn ModelClient,
        task: &str,
        dry_run: bool,
        on_chunk: MessageCallback,
    ) -> Result<(ParsedResponse, ApplyReport)> {
        let prompt = self.build_prompt(task)?;
        let response = client.generate(prompt, on_chunk).await?;
        let parsed = self.parse(&response);
        self.persist(task, &parsed).await?;
        let report = self.apply(&parsed, dry_run).await?;
        Ok((parsed, report))
    }
}
