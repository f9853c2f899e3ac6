use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::shared::config::Settings;
use crate::shared::response::language_for_path;

const SKIP_DIRS: &[&str] = &[".git", ".hg", ".svn", "target", "node_modules", "dist", ".patchsmith"];

#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Relative to the workspace root, '/'-separated.
    pub path: String,
    pub language: Option<String>,
    pub content: String,
}

/// ワークスペースを歩いてプロンプトに入れるファイルを集める
#[derive(Debug)]
pub struct WorkspaceScanner {
    root: PathBuf,
    max_file_bytes: u64,
    ignore: Vec<String>,
}

impl WorkspaceScanner {
    pub fn new(root: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            root: root.into(),
            max_file_bytes: settings.max_file_bytes,
            ignore: settings.ignore.clone(),
        }
    }

    pub fn scan(&self) -> Result<Vec<ScannedFile>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.is_skipped(e));

        for entry in walker {
            let entry =
                entry.with_context(|| format!("failed to walk {}", self.root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let len = entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX);
            if len > self.max_file_bytes {
                tracing::debug!("skipping {} ({} bytes)", entry.path().display(), len);
                continue;
            }
            let bytes = std::fs::read(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;
            if is_binary(&bytes) {
                continue;
            }
            let Ok(content) = String::from_utf8(bytes) else {
                continue;
            };
            let rel = self.relative(entry.path());
            files.push(ScannedFile {
                language: language_for_path(&rel),
                path: rel,
                content,
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn is_skipped(&self, entry: &walkdir::DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref()) {
            return true;
        }
        let rel = self.relative(entry.path());
        self.ignore.iter().any(|fragment| rel.contains(fragment.as_str()))
    }
}

fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(8192).any(|b| *b == 0)
}
