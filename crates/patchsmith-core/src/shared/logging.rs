use chrono::Local;
use serde::Serialize;
use std::path::PathBuf;

/// インタラクションログの書き出し先。無効時は何もしない
#[derive(Debug, Clone, Default)]
pub struct InteractionLog {
    dir: Option<PathBuf>,
}

impl InteractionLog {
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn new(dir: PathBuf) -> Self {
        Self { dir: Some(dir) }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Best-effort structured dump; a failed write is a warning, never an
    /// error for the caller.
    pub fn record<T: Serialize>(&self, name: &str, payload: &T) {
        let Some(dir) = &self.dir else { return };
        let stamp = Local::now().format("%Y%m%d-%H%M%S%3f");
        let path = dir.join(format!("{}-{}.json", stamp, name));
        let body = match serde_json::to_string_pretty(payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("failed to serialize interaction log '{}': {}", name, e);
                return;
            }
        };
        if let Err(e) = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, body)) {
            tracing::warn!("failed to write interaction log {}: {}", path.display(), e);
        }
    }
}
