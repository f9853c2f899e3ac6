use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;

use crate::services::diff::{SearchReplaceResolver, UnifiedDiffResolver};
use crate::shared::logging::InteractionLog;
use crate::shared::response::{EditRecord, EditSource, FileStatus};

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApplyAction {
    Created,
    Modified,
    Deleted,
    Skipped,
    Previewed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyEntry {
    pub path: String,
    pub action: ApplyAction,
    pub notes: Vec<String>,
}

/// 1回の applyAll の結果。ログとは別に構造化された形で呼び出し側へ返す
#[derive(Debug, Default, Serialize)]
pub struct ApplyReport {
    pub entries: Vec<ApplyEntry>,
}

impl ApplyReport {
    fn push(&mut self, path: &str, action: ApplyAction, notes: Vec<String>) {
        self.entries.push(ApplyEntry {
            path: path.to_string(),
            action,
            notes,
        });
    }

    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let count = |action: ApplyAction| {
            self.entries.iter().filter(|e| e.action == action).count()
        };
        (
            count(ApplyAction::Created),
            count(ApplyAction::Modified),
            count(ApplyAction::Deleted),
            count(ApplyAction::Skipped),
        )
    }
}

#[derive(Debug)]
pub struct ChangeApplicator {
    base: PathBuf,
    dry_run: bool,
    search_replace: SearchReplaceResolver,
    unified: UnifiedDiffResolver,
}

impl ChangeApplicator {
    pub fn new(base: impl Into<PathBuf>, dry_run: bool, report_threshold: Option<f64>) -> Self {
        Self {
            base: base.into(),
            dry_run,
            search_replace: SearchReplaceResolver::new(report_threshold),
            unified: UnifiedDiffResolver::new(),
        }
    }

    /// Applies records strictly in list order. The first fatal error aborts
    /// the batch and propagates; records already applied stay on disk so the
    /// caller can inspect or roll back via version control.
    pub async fn apply_all(
        &self,
        records: &[EditRecord],
        log: &InteractionLog,
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        for record in records {
            self.apply_record(record, &mut report)
                .await
                .with_context(|| format!("while applying changes to '{}'", record.path))?;
        }
        log.record("apply_report", &report);
        Ok(report)
    }

    async fn apply_record(&self, record: &EditRecord, report: &mut ApplyReport) -> Result<()> {
        let target = self.resolve_target(&record.path)?;
        match record.status {
            FileStatus::New => self.apply_new(record, &target, report).await,
            FileStatus::Modified => self.apply_modified(record, &target, report).await,
            FileStatus::Deleted => self.apply_deleted(record, &target, report).await,
        }
    }

    fn resolve_target(&self, rel: &str) -> Result<PathBuf> {
        let rel_path = Path::new(rel);
        let escapes = rel_path
            .components()
            .any(|c| matches!(c, Component::ParentDir));
        if rel_path.is_absolute() || escapes {
            bail!("refusing to touch '{}': path leaves the workspace", rel);
        }
        Ok(self.base.join(rel_path))
    }

    async fn apply_new(
        &self,
        record: &EditRecord,
        target: &Path,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let EditSource::WholeFile { content } = &record.source else {
            tracing::warn!("skip {} (new record without content)", record.path);
            report.push(&record.path, ApplyAction::Skipped, vec!["no content".to_string()]);
            return Ok(());
        };
        if self.dry_run {
            tracing::info!(
                "[dry-run] create {}: {}",
                record.path,
                preview(content)
            );
            report.push(&record.path, ApplyAction::Previewed, Vec::new());
            return Ok(());
        }
        self.write_atomic(target, content).await?;
        tracing::info!("create {}", record.path);
        report.push(&record.path, ApplyAction::Created, Vec::new());
        Ok(())
    }

    async fn apply_modified(
        &self,
        record: &EditRecord,
        target: &Path,
        report: &mut ApplyReport,
    ) -> Result<()> {
        if self.dry_run {
            let summary = match &record.source {
                EditSource::SearchReplace { blocks } => {
                    format!("{} search/replace block(s)", blocks.len())
                }
                EditSource::UnifiedDiff { diff } => {
                    format!("diff with {} hunk(s)", diff.hunks.len())
                }
                EditSource::WholeFile { content } => preview(content),
                EditSource::NoOp => "nothing to apply".to_string(),
            };
            tracing::info!("[dry-run] modify {}: {}", record.path, summary);
            report.push(&record.path, ApplyAction::Previewed, Vec::new());
            return Ok(());
        }

        if matches!(record.source, EditSource::NoOp) {
            tracing::info!("skip {} (nothing to apply)", record.path);
            report.push(
                &record.path,
                ApplyAction::Skipped,
                vec!["nothing to apply".to_string()],
            );
            return Ok(());
        }

        // modify は既存ファイルが対象。読めなければ致命的
        let current = fs::read_to_string(target).await.with_context(|| {
            format!(
                "cannot modify '{}': failed to read the current file",
                record.path
            )
        })?;

        let mut notes = Vec::new();
        let updated = match &record.source {
            EditSource::SearchReplace { blocks } => {
                let resolved = self.search_replace.apply(&current, blocks);
                for skipped in resolved.skipped_blocks() {
                    notes.push(format!(
                        "block {} skipped: {}",
                        skipped.index,
                        skipped.note.as_deref().unwrap_or("no match found")
                    ));
                }
                resolved.content
            }
            EditSource::UnifiedDiff { diff } => {
                self.unified.reconstruct(&record.path, &current, diff)?
            }
            EditSource::WholeFile { content } => content.clone(),
            EditSource::NoOp => unreachable!("handled above"),
        };

        self.write_atomic(target, &updated).await?;
        tracing::info!("modify {}", record.path);
        report.push(&record.path, ApplyAction::Modified, notes);
        Ok(())
    }

    async fn apply_deleted(
        &self,
        record: &EditRecord,
        target: &Path,
        report: &mut ApplyReport,
    ) -> Result<()> {
        if self.dry_run {
            tracing::info!("[dry-run] delete {}", record.path);
            report.push(&record.path, ApplyAction::Previewed, Vec::new());
            return Ok(());
        }
        match fs::remove_file(target).await {
            Ok(()) => {
                tracing::info!("delete {}", record.path);
                report.push(&record.path, ApplyAction::Deleted, Vec::new());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("delete {} (already absent)", record.path);
                report.push(
                    &record.path,
                    ApplyAction::Deleted,
                    vec!["already absent".to_string()],
                );
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("failed to delete '{}'", record.path)),
        }
    }

    /// Writes through a temp file in the target's directory, then renames it
    /// into place. The temp file is removed on every failure path when it is
    /// dropped, so a partially written target is never observable.
    async fn write_atomic(&self, target: &Path, content: &str) -> Result<()> {
        let parent = target.parent().unwrap_or(&self.base);
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
        let tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
        fs::write(tmp.path(), content)
            .await
            .with_context(|| format!("failed to write temp file for {}", target.display()))?;
        tmp.persist(target)
            .with_context(|| format!("failed to move temp file into {}", target.display()))?;
        Ok(())
    }
}

fn preview(content: &str) -> String {
    let truncated: String = content.chars().take(PREVIEW_CHARS).collect();
    if truncated.len() < content.len() {
        format!("{}…", truncated.replace('\n', "\\n"))
    } else {
        truncated.replace('\n', "\\n")
    }
}
