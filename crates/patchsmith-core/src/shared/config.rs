use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 実行時設定。`.patchsmith/config.toml` → ユーザー設定 → デフォルトの順
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub max_tokens: u32,
    /// Gate for reporting near-miss search/replace candidates.
    pub report_threshold: f64,
    pub max_file_bytes: u64,
    /// Path fragments the workspace scanner skips, in addition to the
    /// built-in VCS/build directories.
    pub ignore: Vec<String>,
    pub interaction_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-latest".to_string(),
            max_tokens: 8192,
            report_threshold: 0.6,
            max_file_bytes: 128 * 1024,
            ignore: Vec::new(),
            interaction_logging: false,
        }
    }
}

impl Settings {
    pub fn load(workspace: &Path) -> Result<Self> {
        let mut candidates = vec![workspace.join(".patchsmith").join("config.toml")];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("patchsmith").join("config.toml"));
        }
        for path in candidates {
            if path.exists() {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                let settings: Settings = toml::from_str(&text)
                    .with_context(|| format!("failed to parse config {}", path.display()))?;
                return Ok(settings);
            }
        }
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_no_config_present() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.model, "claude-3-5-sonnet-latest");
        assert_eq!(settings.report_threshold, 0.6);
        assert!(!settings.interaction_logging);
    }

    #[test]
    fn test_workspace_config_wins() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join(".patchsmith");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            "model = \"claude-3-opus-latest\"\nmax_tokens = 4096\nignore = [\"vendor\"]\n",
        )
        .unwrap();

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.model, "claude-3-opus-latest");
        assert_eq!(settings.max_tokens, 4096);
        assert_eq!(settings.ignore, vec!["vendor".to_string()]);
        // unspecified keys keep their defaults
        assert_eq!(settings.max_file_bytes, 128 * 1024);
    }

    #[test]
    fn test_broken_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join(".patchsmith");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.toml"), "model = [not toml").unwrap();
        assert!(Settings::load(dir.path()).is_err());
    }
}
