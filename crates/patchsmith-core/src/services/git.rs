use anyhow::Result;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;

pub struct GitService;

impl GitService {
    pub fn new() -> Self {
        Self
    }

    /// Gitコマンドを実行する
    async fn execute_git(&self, args: &[&str], cwd: &Path) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to execute git command: {}", e))
    }

    async fn run_checked(&self, args: &[&str], cwd: &Path) -> Result<String> {
        let output = self.execute_git(args, cwd).await?;
        if !output.status.success() {
            anyhow::bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    pub async fn is_repository(&self, workspace_path: &Path) -> bool {
        self.execute_git(&["rev-parse", "--is-inside-work-tree"], workspace_path)
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// 新しいブランチを切って移動する
    pub async fn create_branch(&self, name: &str, workspace_path: &Path) -> Result<()> {
        self.run_checked(&["checkout", "-b", name], workspace_path)
            .await?;
        tracing::info!("switched to new branch {}", name);
        Ok(())
    }

    /// ワーキングツリーの変更をすべてコミットする
    pub async fn commit_all(&self, message: &str, workspace_path: &Path) -> Result<()> {
        self.run_checked(&["add", "-A"], workspace_path).await?;
        let output = self
            .execute_git(&["commit", "-m", message], workspace_path)
            .await?;
        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if stdout.contains("nothing to commit") {
                tracing::info!("nothing to commit");
                return Ok(());
            }
            anyhow::bail!(
                "git commit failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    /// ワーキングディレクトリの変更状態を取得
    pub async fn get_working_state(&self, workspace_path: &Path) -> Result<String> {
        let status = self
            .run_checked(&["status", "--porcelain"], workspace_path)
            .await?;
        if status.is_empty() {
            return Ok("No changes in working directory".to_string());
        }

        let mut result = String::from("# Changed files\n");
        for line in status.lines() {
            if line.len() < 3 {
                continue;
            }
            let status_text = match line[0..2].trim() {
                "M" => "Modified",
                "A" => "Added",
                "D" => "Deleted",
                "R" => "Renamed",
                "??" => "Untracked",
                _ => "Changed",
            };
            result.push_str(&format!("- {} ({})\n", &line[3..], status_text));
        }

        let stat = self
            .run_checked(&["diff", "--stat", "HEAD"], workspace_path)
            .await
            .unwrap_or_default();
        if !stat.trim().is_empty() {
            result.push_str("\n# Diffstat\n");
            result.push_str(&stat);
        }

        Ok(result)
    }
}

impl Default for GitService {
    fn default() -> Self {
        Self::new()
    }
}
