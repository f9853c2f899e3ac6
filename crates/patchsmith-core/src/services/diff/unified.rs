use anyhow::{bail, Context, Result};

use crate::shared::response::{DiffHunk, FileDiff};

#[derive(Debug, Default)]
pub struct UnifiedDiffResolver;

impl UnifiedDiffResolver {
    pub fn new() -> Self {
        Self
    }

    /// Reconstructs the target content by splicing the hunks, then re-derives
    /// a unified patch between the current content and the reconstruction and
    /// applies that derived patch. The on-disk change is therefore always a
    /// structurally valid patch against the actual current content, never a
    /// bare splice.
    pub fn reconstruct(&self, path: &str, current: &str, diff: &FileDiff) -> Result<String> {
        let had_trailing_newline = current.ends_with('\n');
        let normalized = if had_trailing_newline || current.is_empty() {
            current.to_string()
        } else {
            format!("{}\n", current)
        };

        let target = splice_hunks(path, &normalized, &diff.hunks)?;
        if target == normalized {
            return Ok(current.to_string());
        }

        let derived = similar::TextDiff::from_lines(normalized.as_str(), target.as_str())
            .unified_diff()
            .context_radius(3)
            .header(&diff.old_file, &diff.new_file)
            .to_string();

        let patch = diffy::Patch::from_str(&derived)
            .with_context(|| format!("derived patch for '{}' is not a valid unified diff", path))?;

        let mut result = match diffy::apply(&normalized, &patch) {
            Ok(result) => result,
            Err(e) => bail!(
                "failed to apply diff to '{}': {}. The hunk offsets do not correspond to the \
                 file's actual content; the model likely never saw this file and invented the \
                 line numbers.",
                path,
                e
            ),
        };

        if !had_trailing_newline && result.ends_with('\n') {
            result.pop();
        }
        Ok(result)
    }
}

/// Splices each hunk's new-side lines into the running content, in ascending
/// `new_start` order. Offsets that do not fit the real file are fatal.
fn splice_hunks(path: &str, current: &str, hunks: &[DiffHunk]) -> Result<String> {
    let mut lines: Vec<String> = current.lines().map(String::from).collect();
    let mut ordered: Vec<&DiffHunk> = hunks.iter().collect();
    ordered.sort_by_key(|h| h.new_start);

    for hunk in ordered {
        let start = hunk.new_start.saturating_sub(1);
        if start > lines.len() || start + hunk.old_lines > lines.len() {
            bail!(
                "hunk @@ -{},{} +{},{} @@ does not fit '{}' ({} lines). The hunk offsets do \
                 not correspond to the file's actual content; the model likely never saw this \
                 file and invented the line numbers.",
                hunk.old_start,
                hunk.old_lines,
                hunk.new_start,
                hunk.new_lines,
                path,
                lines.len()
            );
        }
        let new_side: Vec<String> = hunk
            .lines
            .iter()
            .filter_map(|line| match line.chars().next() {
                Some('-') => None,
                Some('+') | Some(' ') => Some(line[1..].to_string()),
                _ => Some(line.clone()),
            })
            .collect();

        let mut rebuilt = Vec::with_capacity(lines.len() + new_side.len());
        rebuilt.extend_from_slice(&lines[..start]);
        rebuilt.extend(new_side);
        rebuilt.extend_from_slice(&lines[start + hunk.old_lines..]);
        lines = rebuilt;
    }

    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}
