use chrono::Local;
use lazy_static::lazy_static;
use regex::Regex;

use crate::shared::logging::InteractionLog;
use crate::shared::response::{
    language_for_path, DiffHunk, EditRecord, EditSource, FileDiff, FileStatus, ParsedResponse,
    SearchReplaceBlock,
};

lazy_static! {
    static ref HUNK_HEADER: Regex =
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").unwrap();
}

pub const PARSE_ERROR_COMMIT_MESSAGE: &str =
    "INVALID RESPONSE: no file list, file blocks, or commit message could be extracted";

/// モデル応答テキストを ParsedResponse に分解する。入力がどれだけ壊れていても
/// エラーにはせず、プレースホルダで埋めて返す
pub fn parse_response(text: &str, log: &InteractionLog) -> ParsedResponse {
    let file_list: Vec<String> = tag_text(text, "file_list")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();

    let files: Vec<EditRecord> = file_blocks(text)
        .into_iter()
        .filter_map(parse_file_block)
        .collect();

    let raw_branch = tag_text(text, "git_branch_name");
    let git_branch_name = if raw_branch.is_empty() {
        String::new()
    } else {
        sanitize_branch_name(&raw_branch)
    };

    let mut git_commit_message = tag_text(text, "git_commit_message");
    let summary = tag_text(text, "summary");
    let potential_issues = tag_text(text, "potential_issues");

    if file_list.is_empty() && files.is_empty() && git_commit_message.is_empty() {
        tracing::warn!("response carried no file list, file blocks, or commit message");
        git_commit_message = PARSE_ERROR_COMMIT_MESSAGE.to_string();
    }

    let parsed = ParsedResponse {
        file_list,
        files,
        git_branch_name,
        git_commit_message,
        summary,
        potential_issues,
    };
    log.record("parsed_response", &parsed);
    parsed
}

/// ブランチ名を git が受け付ける形に正規化する。使える名前を必ず返す
pub fn sanitize_branch_name(raw: &str) -> String {
    let replaced: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = replaced.trim_matches('/');
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '-') {
        format!("patchsmith/task-{}", Local::now().format("%Y%m%d-%H%M%S"))
    } else {
        trimmed.to_string()
    }
}

fn parse_file_block(block: &str) -> Option<EditRecord> {
    let path = tag_text(block, "file_path");
    if path.is_empty() {
        tracing::warn!("dropping file block without a file_path");
        return None;
    }

    let status_raw = tag_text(block, "file_status");
    let Some(status) = FileStatus::parse(&status_raw) else {
        tracing::warn!(
            "dropping file block for '{}' with unrecognized status '{}'",
            path,
            status_raw
        );
        return None;
    };

    let source = match status {
        FileStatus::Deleted => EditSource::NoOp,
        FileStatus::New => match tag_body(block, "file_content") {
            Some(body) => EditSource::WholeFile {
                content: content_body(body),
            },
            None => {
                tracing::warn!("new file '{}' has no file_content; treating as no-op", path);
                EditSource::NoOp
            }
        },
        FileStatus::Modified => parse_modified_source(&path, block),
    };

    Some(EditRecord {
        language: language_for_path(&path),
        path,
        status,
        source,
        explanation: non_empty(tag_text(block, "explanation")),
    })
}

/// Modified レコードの編集表現。file_changes > file_diff > file_content の優先順で
/// どれか1つだけを採用する
fn parse_modified_source(path: &str, block: &str) -> EditSource {
    if let Some(body) = tag_body(block, "file_changes") {
        let blocks = parse_change_blocks(body);
        if !blocks.is_empty() {
            return EditSource::SearchReplace { blocks };
        }
    }
    if let Some(body) = tag_body(block, "file_diff") {
        if let Some(diff) = parse_diff_body(path, body) {
            return EditSource::UnifiedDiff { diff };
        }
    }
    if let Some(body) = tag_body(block, "file_content") {
        return EditSource::WholeFile {
            content: content_body(body),
        };
    }
    EditSource::NoOp
}

fn parse_change_blocks(body: &str) -> Vec<SearchReplaceBlock> {
    blocks_of(body, "change")
        .into_iter()
        .filter_map(|change| {
            let search = tag_body(change, "search").map(section_body)?;
            let replace = tag_body(change, "replace").map(section_body)?;
            if search.trim().is_empty() || replace.trim().is_empty() {
                tracing::warn!("discarding search/replace block with an empty half");
                return None;
            }
            Some(SearchReplaceBlock { search, replace })
        })
        .collect()
}

fn parse_diff_body(path: &str, body: &str) -> Option<FileDiff> {
    let mut old_file = String::new();
    let mut new_file = String::new();
    let mut hunks: Vec<DiffHunk> = Vec::new();
    let mut current: Option<DiffHunk> = None;

    for line in body.lines() {
        // --- / +++ はハンクより前にだけ現れる
        if current.is_none() && hunks.is_empty() {
            if let Some(rest) = line.strip_prefix("--- ") {
                old_file = rest.trim().to_string();
                continue;
            }
            if let Some(rest) = line.strip_prefix("+++ ") {
                new_file = rest.trim().to_string();
                continue;
            }
        }
        if let Some(caps) = HUNK_HEADER.captures(line) {
            if let Some(done) = current.take() {
                hunks.push(done);
            }
            current = Some(DiffHunk {
                old_start: caps[1].parse().unwrap_or(0),
                old_lines: caps.get(2).map_or(1, |m| m.as_str().parse().unwrap_or(1)),
                new_start: caps[3].parse().unwrap_or(0),
                new_lines: caps.get(4).map_or(1, |m| m.as_str().parse().unwrap_or(1)),
                lines: Vec::new(),
            });
            continue;
        }
        if let Some(hunk) = current.as_mut() {
            hunk.lines.push(line.to_string());
        }
    }
    if let Some(done) = current.take() {
        hunks.push(done);
    }

    if hunks.is_empty() {
        tracing::warn!("file_diff for '{}' contained no hunks; ignoring", path);
        return None;
    }
    if old_file.is_empty() {
        old_file = path.to_string();
    }
    if new_file.is_empty() {
        new_file = path.to_string();
    }
    Some(FileDiff {
        old_file,
        new_file,
        hunks,
    })
}

/// タグ直後と閉じタグ直前の改行1つだけを取り除く。行内のインデントは保持する
fn section_body(body: &str) -> String {
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body);
    let body = match body.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => body,
    };
    body.to_string()
}

fn content_body(body: &str) -> String {
    strip_code_fence(&section_body(body))
}

/// モデルがコードフェンスで包んできた場合はフェンスだけ剥がす
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim_end();
    if !trimmed.starts_with("```") || !trimmed.ends_with("```") {
        return text.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() < 2 {
        return text.to_string();
    }
    lines.remove(0);
    lines.pop();
    lines.join("\n")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// `<tag>` の最初の出現から `</tag>` まで。閉じタグが無ければ末尾までを返す
fn tag_body<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = text.find(&open)? + open.len();
    let rest = &text[start..];
    match rest.find(&close) {
        Some(end) => Some(&rest[..end]),
        None => Some(rest),
    }
}

fn tag_text(text: &str, tag: &str) -> String {
    tag_body(text, tag)
        .map(|b| b.trim().to_string())
        .unwrap_or_default()
}

fn blocks_of<'a>(text: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(&open) {
        let after = &rest[pos + open.len()..];
        match after.find(&close) {
            Some(end) => {
                out.push(&after[..end]);
                rest = &after[end + close.len()..];
            }
            None => {
                out.push(after);
                break;
            }
        }
    }
    out
}

fn file_blocks(text: &str) -> Vec<&str> {
    blocks_of(text, "file")
}
