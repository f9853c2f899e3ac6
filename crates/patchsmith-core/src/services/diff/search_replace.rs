use strsim::normalized_levenshtein;

use crate::services::diff::types::{BlockOutcome, ResolvedEdit};
use crate::shared::response::SearchReplaceBlock;

const DEFAULT_REPORT_THRESHOLD: f64 = 0.6;

#[derive(Debug)]
pub struct SearchReplaceResolver {
    report_threshold: f64,
}

impl SearchReplaceResolver {
    pub fn new(report_threshold: Option<f64>) -> Self {
        Self {
            report_threshold: report_threshold.unwrap_or(DEFAULT_REPORT_THRESHOLD),
        }
    }

    /// Applies blocks in order. A block that fails to match is skipped and
    /// surfaced in the outcomes; the remaining blocks still apply.
    pub fn apply(&self, source: &str, blocks: &[SearchReplaceBlock]) -> ResolvedEdit {
        let had_trailing_newline = source.ends_with('\n');
        let mut lines: Vec<String> = source.lines().map(String::from).collect();
        let mut outcomes = Vec::with_capacity(blocks.len());

        for (index, block) in blocks.iter().enumerate() {
            let note = self.apply_block(&mut lines, block);
            let applied = note.is_none();
            if let Some(msg) = &note {
                tracing::warn!("search/replace block {} skipped: {}", index, msg);
            }
            outcomes.push(BlockOutcome {
                index,
                applied,
                note,
            });
        }

        let mut content = lines.join("\n");
        if had_trailing_newline && !content.is_empty() {
            content.push('\n');
        }
        ResolvedEdit { content, outcomes }
    }

    /// Returns `None` on success, or a diagnostic describing why the block
    /// could not be applied.
    fn apply_block(&self, lines: &mut Vec<String>, block: &SearchReplaceBlock) -> Option<String> {
        let search_lines: Vec<&str> = block.search.lines().collect();
        let replace_lines: Vec<&str> = block.replace.lines().collect();
        if search_lines.is_empty() {
            return Some("empty search text".to_string());
        }

        // 1. byte-for-byte window match
        if let Some(at) = find_exact(lines, &search_lines) {
            let replacement: Vec<String> = replace_lines.iter().map(|l| l.to_string()).collect();
            splice(lines, at, search_lines.len(), replacement);
            return None;
        }

        // 2. whitespace-tolerant: outdent search and replace together, then
        //    compare against each window with the window's own indent removed
        let shared_indent = min_indent(search_lines.iter().chain(replace_lines.iter()).copied());
        let search_out: Vec<String> = outdent(&search_lines, shared_indent);
        let replace_out: Vec<String> = outdent(&replace_lines, shared_indent);

        if let Some((at, indent)) = find_outdented(lines, &search_out) {
            let reindented = replace_out.iter().map(|l| {
                if l.trim().is_empty() {
                    l.clone()
                } else {
                    format!("{}{}", indent, l)
                }
            });
            let replacement: Vec<String> = reindented.collect();
            splice(lines, at, search_lines.len(), replacement);
            return None;
        }

        // 3. no-op; report the closest equal-length window when it is close
        //    enough to be worth pointing at
        if let Some(candidate) = closest_candidate(lines, &search_lines) {
            if candidate.ratio >= self.report_threshold {
                return Some(format!(
                    "no match found; closest candidate at line {} ({} of {} lines equal, {:.0}% similar)",
                    candidate.line + 1,
                    candidate.equal_lines,
                    search_lines.len(),
                    candidate.similarity * 100.0
                ));
            }
        }
        Some("no match found".to_string())
    }
}

struct Candidate {
    line: usize,
    ratio: f64,
    equal_lines: usize,
    similarity: f64,
}

fn find_exact(lines: &[String], search: &[&str]) -> Option<usize> {
    if search.len() > lines.len() {
        return None;
    }
    (0..=lines.len() - search.len()).find(|&i| {
        lines[i..i + search.len()]
            .iter()
            .map(String::as_str)
            .eq(search.iter().copied())
    })
}

fn find_outdented(lines: &[String], search_out: &[String]) -> Option<(usize, String)> {
    if search_out.is_empty() || search_out.len() > lines.len() {
        return None;
    }
    for i in 0..=lines.len() - search_out.len() {
        let chunk = &lines[i..i + search_out.len()];
        let indent = leading_whitespace(&chunk[0]);
        let indent_chars = indent.chars().count();
        let matches = chunk
            .iter()
            .map(|l| strip_indent(l, indent_chars))
            .eq(search_out.iter().map(String::as_str));
        if matches {
            return Some((i, indent.to_string()));
        }
    }
    None
}

fn closest_candidate(lines: &[String], search: &[&str]) -> Option<Candidate> {
    if search.is_empty() || search.len() > lines.len() {
        return None;
    }
    let mut best: Option<Candidate> = None;
    for i in 0..=lines.len() - search.len() {
        let chunk = &lines[i..i + search.len()];
        let equal = search
            .iter()
            .zip(chunk.iter())
            .filter(|(s, c)| **s == c.as_str())
            .count();
        let ratio = equal as f64 / search.len() as f64;
        if best.as_ref().map_or(true, |b| ratio > b.ratio) {
            let similarity = normalized_levenshtein(
                &search.join("\n"),
                &chunk.join("\n"),
            );
            best = Some(Candidate {
                line: i,
                ratio,
                equal_lines: equal,
                similarity,
            });
        }
    }
    best
}

fn splice(lines: &mut Vec<String>, at: usize, remove: usize, replacement: Vec<String>) {
    let mut rebuilt = Vec::with_capacity(lines.len() + replacement.len());
    rebuilt.extend_from_slice(&lines[..at]);
    rebuilt.extend(replacement);
    rebuilt.extend_from_slice(&lines[at + remove..]);
    *lines = rebuilt;
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

fn min_indent<'a>(lines: impl Iterator<Item = &'a str>) -> usize {
    lines
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading_whitespace(l).chars().count())
        .min()
        .unwrap_or(0)
}

fn outdent(lines: &[&str], n: usize) -> Vec<String> {
    lines.iter().map(|l| strip_indent(l, n).to_string()).collect()
}

/// 行頭の空白文字を最大 n 文字だけ取り除く
fn strip_indent(line: &str, n: usize) -> &str {
    let mut rest = line;
    for _ in 0..n {
        match rest.chars().next() {
            Some(ch) if ch.is_whitespace() => rest = &rest[ch.len_utf8()..],
            _ => break,
        }
    }
    rest
}
