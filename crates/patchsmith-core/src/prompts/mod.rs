use crate::services::workspace::ScannedFile;

/// 応答フォーマットの指示。Response Parser が読むタグ文法と対になっている
pub const RESPONSE_FORMAT_SECTION: &str = r#"# Response format

Respond with the following tags, in this order. Do not wrap the response in markdown.

<summary>
One short paragraph describing the change set.
</summary>
<file_list>
one relative path per line, every file you create, modify, or delete
</file_list>
<file>
<file_path>relative/path/to/file</file_path>
<file_status>new|modified|deleted</file_status>
<explanation>Optional one-line rationale.</explanation>
...exactly one edit representation (see below)...
</file>
<git_branch_name>a-short-branch-name</git_branch_name>
<git_commit_message>a conventional commit message</git_commit_message>
<potential_issues>Anything the reviewer should double-check, or "None."</potential_issues>

Edit representations, one per <file> block:

1. New files always carry the complete content:
<file_content>
the entire file content
</file_content>

2. Small, targeted edits to an existing file use search/replace blocks. The
search half must reproduce the current file text exactly, including indentation:
<file_changes>
<change>
<search>
lines exactly as they appear in the file
</search>
<replace>
the replacement lines
</replace>
</change>
</file_changes>

3. Larger edits to an existing file may use a unified diff (diff -U3) with
correct line numbers:
<file_diff>
--- relative/path/to/file
+++ relative/path/to/file
@@ -lineStart,lineCount +lineStart,lineCount @@
 context line
-removed line
+added line
</file_diff>

Deleted files carry no content. Never mix representations for one file."#;

pub fn build_task_prompt(task: &str, files: &[ScannedFile]) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        get_task_section(task),
        get_codebase_section(files),
        RESPONSE_FORMAT_SECTION
    )
}

fn get_task_section(task: &str) -> String {
    format!("# Task\n\n{}", task.trim())
}

fn get_codebase_section(files: &[ScannedFile]) -> String {
    let mut section = String::from("# Codebase\n\n## File tree\n\n");
    for file in files {
        section.push_str("- ");
        section.push_str(&file.path);
        section.push('\n');
    }
    section.push_str("\n## Files\n");
    for file in files {
        let fence_lang = file.language.as_deref().unwrap_or("");
        section.push_str(&format!(
            "\n### {}\n\n```{}\n{}\n```\n",
            file.path,
            fence_lang,
            file.content.trim_end_matches('\n')
        ));
    }
    section
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanned(path: &str, language: Option<&str>, content: &str) -> ScannedFile {
        ScannedFile {
            path: path.to_string(),
            language: language.map(String::from),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_prompt_contains_all_sections() {
        let files = vec![
            scanned("src/main.rs", Some("rust"), "fn main() {}\n"),
            scanned("README.md", Some("markdown"), "# hi\n"),
        ];
        let prompt = build_task_prompt("rename the greeting", &files);

        assert!(prompt.starts_with("# Task\n\nrename the greeting"));
        assert!(prompt.contains("- src/main.rs\n"));
        assert!(prompt.contains("### src/main.rs\n\n```rust\nfn main() {}\n```"));
        assert!(prompt.contains("# Response format"));
        assert!(prompt.contains("<git_commit_message>"));
    }

    #[test]
    fn test_files_without_language_get_bare_fences() {
        let files = vec![scanned("LICENSE", None, "MIT\n")];
        let prompt = build_task_prompt("t", &files);
        assert!(prompt.contains("```\nMIT\n```"));
    }
}
