//! Diff previews for mutation-proposing tools
//!
//! Edits that defer to user approval carry a [`DiffPreview`] so the host can
//! render what would change before anything is written. Line counts come
//! from a multiset difference of non-blank lines; the unified diff is
//! LCS-based with three lines of context per hunk.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of diff lines shown in the short preview.
pub const PREVIEW_LINE_LIMIT: usize = 15;

/// Line-pair budget above which the LCS matrix is skipped and the diff
/// degrades to a whole-file replacement hunk.
const LCS_CELL_BUDGET: usize = 4_000_000;

/// A pending file mutation, rendered before it is applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffPreview {
    pub file_path: String,
    pub is_new: bool,
    pub is_delete: bool,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub old_content: String,
    pub new_content: String,
    pub unified_diff: String,
    /// First [`PREVIEW_LINE_LIMIT`] diff lines, with an elision marker.
    pub preview: String,
}

/// Build a diff preview for replacing `old` with `new` at `path`.
pub fn generate_diff(path: &str, old: &str, new: &str) -> DiffPreview {
    let (lines_added, lines_removed) = count_line_changes(old, new);
    let unified_diff = generate_unified_diff(path, old, new);
    let preview = preview_of(&unified_diff);

    DiffPreview {
        file_path: path.to_string(),
        is_new: old.is_empty() && !new.is_empty(),
        is_delete: !old.is_empty() && new.is_empty(),
        lines_added,
        lines_removed,
        old_content: old.to_string(),
        new_content: new.to_string(),
        unified_diff,
        preview,
    }
}

/// Multiset difference of non-blank lines.
fn count_line_changes(old: &str, new: &str) -> (usize, usize) {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for line in old.lines().filter(|l| !l.trim().is_empty()) {
        *counts.entry(line).or_default() -= 1;
    }
    for line in new.lines().filter(|l| !l.trim().is_empty()) {
        *counts.entry(line).or_default() += 1;
    }

    let mut added = 0usize;
    let mut removed = 0usize;
    for delta in counts.values() {
        if *delta > 0 {
            added += *delta as usize;
        } else {
            removed += (-*delta) as usize;
        }
    }
    (added, removed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Keep,
    Remove,
    Add,
}

fn generate_unified_diff(path: &str, old: &str, new: &str) -> String {
    if old == new {
        return String::new();
    }

    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    let ops = if old_lines.len().saturating_mul(new_lines.len()) > LCS_CELL_BUDGET {
        // Degenerate but parseable: remove everything, add everything.
        let mut ops: Vec<(Op, usize)> = Vec::with_capacity(old_lines.len() + new_lines.len());
        ops.extend((0..old_lines.len()).map(|i| (Op::Remove, i)));
        ops.extend((0..new_lines.len()).map(|i| (Op::Add, i)));
        ops
    } else {
        diff_ops(&old_lines, &new_lines)
    };

    render_hunks(path, &old_lines, &new_lines, &ops)
}

/// LCS edit script over the two line slices.
///
/// Each entry pairs an op with an index into the relevant side: `Keep` and
/// `Remove` index `old`, `Add` indexes `new`.
fn diff_ops(old: &[&str], new: &[&str]) -> Vec<(Op, usize)> {
    let n = old.len();
    let m = new.len();
    let mut table = vec![0u32; (n + 1) * (m + 1)];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * (m + 1) + j] = if old[i] == new[j] {
                table[(i + 1) * (m + 1) + j + 1] + 1
            } else {
                table[(i + 1) * (m + 1) + j].max(table[i * (m + 1) + j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push((Op::Keep, i));
            i += 1;
            j += 1;
        } else if table[(i + 1) * (m + 1) + j] >= table[i * (m + 1) + j + 1] {
            ops.push((Op::Remove, i));
            i += 1;
        } else {
            ops.push((Op::Add, j));
            j += 1;
        }
    }
    while i < n {
        ops.push((Op::Remove, i));
        i += 1;
    }
    while j < m {
        ops.push((Op::Add, j));
        j += 1;
    }
    ops
}

fn render_hunks(path: &str, old: &[&str], new: &[&str], ops: &[(Op, usize)]) -> String {
    const CONTEXT: usize = 3;

    let mut out = format!("--- a/{}\n+++ b/{}\n", path, path);

    // Indices of ops that are changes, used to group hunks.
    let change_idx: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, (op, _))| *op != Op::Keep)
        .map(|(idx, _)| idx)
        .collect();
    if change_idx.is_empty() {
        return String::new();
    }

    // Group changes whose context windows touch into one hunk.
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut start = change_idx[0];
    let mut end = change_idx[0];
    for &idx in &change_idx[1..] {
        if idx <= end + 2 * CONTEXT {
            end = idx;
        } else {
            groups.push((start, end));
            start = idx;
            end = idx;
        }
    }
    groups.push((start, end));

    for (first, last) in groups {
        let lo = first.saturating_sub(CONTEXT);
        let hi = (last + CONTEXT + 1).min(ops.len());

        // Old/new line numbers at the start of the hunk (1-indexed).
        let old_start = ops[..lo]
            .iter()
            .filter(|(op, _)| *op != Op::Add)
            .count();
        let new_start = ops[..lo]
            .iter()
            .filter(|(op, _)| *op != Op::Remove)
            .count();
        let old_count = ops[lo..hi]
            .iter()
            .filter(|(op, _)| *op != Op::Add)
            .count();
        let new_count = ops[lo..hi]
            .iter()
            .filter(|(op, _)| *op != Op::Remove)
            .count();

        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            old_start + 1,
            old_count,
            new_start + 1,
            new_count
        ));
        for &(op, idx) in &ops[lo..hi] {
            match op {
                Op::Keep => {
                    out.push(' ');
                    out.push_str(old[idx]);
                }
                Op::Remove => {
                    out.push('-');
                    out.push_str(old[idx]);
                }
                Op::Add => {
                    out.push('+');
                    out.push_str(new[idx]);
                }
            }
            out.push('\n');
        }
    }

    out
}

/// Cap a diff to its first [`PREVIEW_LINE_LIMIT`] lines.
fn preview_of(unified_diff: &str) -> String {
    let lines: Vec<&str> = unified_diff.lines().collect();
    if lines.len() <= PREVIEW_LINE_LIMIT {
        return unified_diff.trim_end().to_string();
    }
    let mut preview = lines[..PREVIEW_LINE_LIMIT].join("\n");
    preview.push_str(&format!(
        "\n... ({} more lines)",
        lines.len() - PREVIEW_LINE_LIMIT
    ));
    preview
}
