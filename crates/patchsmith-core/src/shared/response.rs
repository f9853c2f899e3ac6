use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ファイル1件に対する宣言された変更
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditRecord {
    pub path: String,
    pub status: FileStatus,
    pub language: Option<String>,
    pub source: EditSource,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    New,
    Modified,
    Deleted,
}

impl FileStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" | "created" => Some(Self::New),
            "modified" | "changed" => Some(Self::Modified),
            "deleted" | "removed" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Modified => write!(f, "modified"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// 編集内容の表現。1レコードにつき必ず1つだけ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditSource {
    WholeFile { content: String },
    SearchReplace { blocks: Vec<SearchReplaceBlock> },
    UnifiedDiff { diff: FileDiff },
    NoOp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchReplaceBlock {
    pub search: String,
    pub replace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileDiff {
    pub old_file: String,
    pub new_file: String,
    pub hunks: Vec<DiffHunk>,
}

/// unified diff のハンク。`lines` は `+`/`-`/` ` プレフィックス付きのまま保持する
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_lines: usize,
    pub new_start: usize,
    pub new_lines: usize,
    pub lines: Vec<String>,
}

/// モデル応答1ターン分のデコード結果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParsedResponse {
    pub file_list: Vec<String>,
    pub files: Vec<EditRecord>,
    pub git_branch_name: String,
    pub git_commit_message: String,
    pub summary: String,
    pub potential_issues: String,
}

static LANGUAGE_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("rs", "rust"),
        ("ts", "typescript"),
        ("tsx", "typescript"),
        ("js", "javascript"),
        ("jsx", "javascript"),
        ("py", "python"),
        ("go", "go"),
        ("rb", "ruby"),
        ("java", "java"),
        ("kt", "kotlin"),
        ("c", "c"),
        ("h", "c"),
        ("cpp", "cpp"),
        ("hpp", "cpp"),
        ("cs", "csharp"),
        ("swift", "swift"),
        ("php", "php"),
        ("sh", "bash"),
        ("toml", "toml"),
        ("yaml", "yaml"),
        ("yml", "yaml"),
        ("json", "json"),
        ("md", "markdown"),
        ("html", "html"),
        ("css", "css"),
        ("sql", "sql"),
    ])
});

/// 拡張子から言語名を推定する（表示用のヒントであり適用処理には使わない）
pub fn language_for_path(path: &str) -> Option<String> {
    let ext = path.rsplit('.').next()?;
    if ext == path {
        return None;
    }
    LANGUAGE_MAP
        .get(ext.to_ascii_lowercase().as_str())
        .map(|s| (*s).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_language_for_path() {
        assert_eq!(language_for_path("src/main.rs"), Some("rust".to_string()));
        assert_eq!(language_for_path("a/b/app.TSX"), Some("typescript".to_string()));
        assert_eq!(language_for_path("Makefile"), None);
        assert_eq!(language_for_path("weird.zzz"), None);
    }

    #[test]
    fn test_parsed_response_round_trip() {
        let response = ParsedResponse {
            file_list: vec!["src/lib.rs".to_string(), "new.txt".to_string()],
            files: vec![
                EditRecord {
                    path: "new.txt".to_string(),
                    status: FileStatus::New,
                    language: None,
                    source: EditSource::WholeFile {
                        content: "hello\n".to_string(),
                    },
                    explanation: Some("adds a greeting".to_string()),
                },
                EditRecord {
                    path: "src/lib.rs".to_string(),
                    status: FileStatus::Modified,
                    language: Some("rust".to_string()),
                    source: EditSource::SearchReplace {
                        blocks: vec![SearchReplaceBlock {
                            search: "old".to_string(),
                            replace: "new".to_string(),
                        }],
                    },
                    explanation: None,
                },
                EditRecord {
                    path: "src/main.rs".to_string(),
                    status: FileStatus::Modified,
                    language: Some("rust".to_string()),
                    source: EditSource::UnifiedDiff {
                        diff: FileDiff {
                            old_file: "src/main.rs".to_string(),
                            new_file: "src/main.rs".to_string(),
                            hunks: vec![DiffHunk {
                                old_start: 1,
                                old_lines: 2,
                                new_start: 1,
                                new_lines: 2,
                                lines: vec![
                                    " fn main() {".to_string(),
                                    "-    println!(\"a\");".to_string(),
                                    "+    println!(\"b\");".to_string(),
                                ],
                            }],
                        },
                    },
                    explanation: None,
                },
                EditRecord {
                    path: "obsolete.txt".to_string(),
                    status: FileStatus::Deleted,
                    language: None,
                    source: EditSource::NoOp,
                    explanation: None,
                },
            ],
            git_branch_name: "feature/greeting".to_string(),
            git_commit_message: "feat: add greeting".to_string(),
            summary: "Adds a greeting file".to_string(),
            potential_issues: "None".to_string(),
        };

        let json = serde_json::to_string_pretty(&response).unwrap();
        let decoded: ParsedResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, response);
    }
}
