//! Extended unified-diff parser.
//!
//! Features:
//! - Works even if file headers (---/+++) are missing (hunks-only input).
//! - Ignores `\ No newline at end of file` marker lines.
//! - Binary patches heuristics (`GIT binary patch`, `Binary files ... differ`).
//!
//! It produces provider-agnostic hunks/lines for later position mapping.

use crate::git_providers::types::{DiffHunk, DiffLine};

/// Parses unified diff string into hunks/lines.
/// Robust to missing file headers; only `@@` headers are required.
pub fn parse_unified_diff_advanced(s: &str) -> Vec<DiffHunk> {
    let mut hunks = Vec::new();
    let mut cur_old_start = 0u32;
    let mut cur_old_lines = 0u32;
    let mut cur_new_start = 0u32;
    let mut cur_new_lines = 0u32;
    let mut lines_buf: Vec<DiffLine> = Vec::new();
    let mut old_line = 0u32;
    let mut new_line = 0u32;
    let mut in_hunk = false;

    for line in s.lines() {
        if line.starts_with("@@") {
            if in_hunk && !lines_buf.is_empty() {
                hunks.push(DiffHunk {
                    old_start: cur_old_start,
                    old_lines: cur_old_lines,
                    new_start: cur_new_start,
                    new_lines: cur_new_lines,
                    lines: std::mem::take(&mut lines_buf),
                });
            }
            if let Some((left, right)) = line
                .trim_start_matches('@')
                .trim_end_matches('@')
                .trim()
                .split_once('+')
            {
                let left_nums = left.trim().trim_start_matches('-');
                let right_nums = right.trim();
                let (o_start, o_len) = split_nums(left_nums);
                let (n_start, n_len) = split_nums(right_nums);
                cur_old_start = o_start;
                cur_old_lines = o_len;
                cur_new_start = n_start;
                cur_new_lines = n_len;
                old_line = o_start;
                new_line = n_start;
                in_hunk = true;
            }
            continue;
        }

        // Ignore marker lines (not part of diff content)
        if line.starts_with("\\ ") {
            continue;
        }

        if !in_hunk {
            // Skip random prelude (headers, context) until first '@@'
            continue;
        }

        if let Some(rest) = line.strip_prefix('+') {
            lines_buf.push(DiffLine::Added {
                new_line,
                content: rest.to_string(),
            });
            new_line += 1;
        } else if let Some(rest) = line.strip_prefix('-') {
            lines_buf.push(DiffLine::Removed {
                old_line,
                content: rest.to_string(),
            });
            old_line += 1;
        } else if let Some(rest) = line.strip_prefix(' ') {
            lines_buf.push(DiffLine::Context {
                old_line,
                new_line,
                content: rest.to_string(),
            });
            old_line += 1;
            new_line += 1;
        } else {
            // If a weird line sneaks in, assume "context".
            lines_buf.push(DiffLine::Context {
                old_line,
                new_line,
                content: line.to_string(),
            });
            old_line += 1;
            new_line += 1;
        }
    }

    if in_hunk && !lines_buf.is_empty() {
        hunks.push(DiffHunk {
            old_start: cur_old_start,
            old_lines: cur_old_lines,
            new_start: cur_new_start,
            new_lines: cur_new_lines,
            lines: lines_buf,
        });
    }
    hunks
}

/// Splits "12,7" or "12" into (start, len).
fn split_nums(s: &str) -> (u32, u32) {
    let s = s.trim();
    if let Some((a, b)) = s.split_once(',') {
        (a.parse().unwrap_or(0), b.parse().unwrap_or(0))
    } else {
        (s.parse().unwrap_or(0), 0)
    }
}

/// Simple heuristic to detect binary patches or messages in unified diff.
pub fn looks_like_binary_patch(s: &str) -> bool {
    s.contains("GIT binary patch")
        || s.starts_with("Binary files ")
        || (s.starts_with("Files ") && s.contains(" differ"))
}

// ---------------------------------------------------------------------------
// Diff Parser — line-level view used by the Context Assembler and
// the Finding Mapper. Distinct from `parse_unified_diff_advanced` above (which
// groups lines into provider-facing `DiffHunk`s); this is a flat, position-
// indexed view built straight from the diff text, because the Finding Mapper
// needs the provider's comment-placement coordinate (`position`), not hunk
// boundaries.
// ---------------------------------------------------------------------------

use crate::model::{DiffLine, DiffLineKind};
use std::collections::HashMap;

/// Parses unified-diff text into a flat, ordered `DiffLine` list.
///
/// File headers (`diff --git`, `index`, `---`, `+++`) are skipped entirely —
/// they carry no line numbers and are never addressable. A `@@` hunk header
/// resets the old/new line counters and is emitted as a `Header` line (no
/// line numbers, no position). Every subsequent line increments a single
/// running `position` counter that is *not* reset between hunks, matching
/// the provider's diff-wide comment coordinate. Malformed hunk headers are
/// tolerated: the old/new counters simply fail to advance for that hunk.
pub fn parse_diff_lines(diff_text: &str) -> Vec<DiffLine> {
    let mut out = Vec::new();
    let mut old_line = 0u32;
    let mut new_line = 0u32;
    let mut position = 0u32;

    for line in diff_text.lines() {
        if line.starts_with("diff --git")
            || line.starts_with("index ")
            || line.starts_with("--- ")
            || line.starts_with("+++ ")
            || line == "---"
            || line == "+++"
        {
            continue;
        }

        if line.starts_with("@@") {
            if let Some((o, n)) = parse_hunk_header(line) {
                old_line = o;
                new_line = n;
            }
            out.push(DiffLine {
                kind: DiffLineKind::Header,
                content: line.to_string(),
                old_line: None,
                new_line: None,
                position: None,
            });
            continue;
        }

        position += 1;
        if let Some(rest) = line.strip_prefix('+') {
            out.push(DiffLine {
                kind: DiffLineKind::Added,
                content: rest.to_string(),
                old_line: None,
                new_line: Some(new_line),
                position: Some(position),
            });
            new_line += 1;
        } else if let Some(rest) = line.strip_prefix('-') {
            out.push(DiffLine {
                kind: DiffLineKind::Removed,
                content: rest.to_string(),
                old_line: Some(old_line),
                new_line: None,
                position: Some(position),
            });
            old_line += 1;
        } else {
            let rest = line.strip_prefix(' ').unwrap_or(line);
            out.push(DiffLine {
                kind: DiffLineKind::Context,
                content: rest.to_string(),
                old_line: Some(old_line),
                new_line: Some(new_line),
                position: Some(position),
            });
            old_line += 1;
            new_line += 1;
        }
    }

    out
}

/// Parses a `@@ -A,B +C,D @@`-style hunk header into `(old_start, new_start)`.
/// Returns `None` for anything that doesn't contain a `+` separator, which
/// callers treat as "counters don't advance" rather than a hard failure.
fn parse_hunk_header(line: &str) -> Option<(u32, u32)> {
    let body = line.trim_start_matches('@').trim_end_matches('@').trim();
    let (left, right) = body.split_once('+')?;
    let (old_start, _) = split_nums(left.trim().trim_start_matches('-'));
    let (new_start, _) = split_nums(right.trim());
    Some((old_start, new_start))
}

/// Builds the new-line → position index the Finding Mapper uses to attach a
/// provider coordinate to an LLM finding. Built from added
/// and context lines only, as removed lines carry no `new_line`.
pub fn line_to_position(lines: &[DiffLine]) -> HashMap<usize, u32> {
    lines
        .iter()
        .filter_map(|l| match (l.new_line, l.position) {
            (Some(n), Some(p)) => Some((n as usize, p)),
            _ => None,
        })
        .collect()
}

/// The set of new-side line numbers a reviewer may annotate.
pub fn added_new_lines(lines: &[DiffLine]) -> Vec<usize> {
    lines
        .iter()
        .filter(|l| l.kind == DiffLineKind::Added)
        .filter_map(|l| l.new_line.map(|n| n as usize))
        .collect()
}

/// Numbered, grouped rendering of a diff for LLM consumption: one line per
/// entry, new-side line number first, blank-line separated wherever the
/// new-side line gap exceeds three.
pub fn clean_render(lines: &[DiffLine]) -> String {
    let mut out = String::new();
    let mut last_new: Option<u32> = None;

    for l in lines {
        let marker = match l.kind {
            DiffLineKind::Added => '+',
            DiffLineKind::Removed => '-',
            DiffLineKind::Context => ' ',
            DiffLineKind::Header => continue,
        };
        if let (Some(prev), Some(cur)) = (last_new, l.new_line) {
            if cur.saturating_sub(prev) > 3 {
                out.push('\n');
            }
        }
        let line_no = l.new_line.or(l.old_line).unwrap_or(0);
        out.push_str(&format!("{line_no:>5} {marker}{}\n", l.content));
        if let Some(n) = l.new_line {
            last_new = Some(n);
        }
    }
    out
}

#[cfg(test)]
mod diff_position_tests {
    use super::*;

    #[test]
    fn line_to_position_matches_scenario_4() {
        let diff = "@@ -1,2 +1,3 @@\n a\n+b\n c";
        let lines = parse_diff_lines(diff);
        let map = line_to_position(&lines);
        assert_eq!(map.get(&1), Some(&1));
        assert_eq!(map.get(&2), Some(&2));
        assert_eq!(map.get(&3), Some(&3));
        assert_eq!(added_new_lines(&lines), vec![2]);
    }

    #[test]
    fn position_is_stable_for_any_added_line() {
        let diff = "@@ -1,2 +1,4 @@\n a\n+b\n+c\n d";
        let lines = parse_diff_lines(diff);
        for line in lines.iter().filter(|l| l.new_line.is_some()) {
            let expected_idx = lines
                .iter()
                .take_while(|x| !std::ptr::eq(*x, line))
                .filter(|x| x.position.is_some())
                .count() as u32
                + 1;
            assert_eq!(line.position, Some(expected_idx));
        }
    }

    #[test]
    fn malformed_hunk_header_does_not_panic() {
        let diff = "@@ garbage @@\n+only added\n";
        let lines = parse_diff_lines(diff);
        assert_eq!(lines.len(), 2);
        assert_eq!(added_new_lines(&lines), vec![0]);
    }

    #[test]
    fn empty_diff_yields_empty_result() {
        assert!(parse_diff_lines("").is_empty());
    }

    #[test]
    fn clean_render_inserts_blank_line_on_large_gap() {
        let diff = "@@ -1,1 +1,10 @@\n a\n+b\n+c\n+d\n+e\n+f\n+g\n+h\n+i\n+j";
        let lines = parse_diff_lines(diff);
        let rendered = clean_render(&lines);
        assert!(rendered.contains("\n\n"));
    }
}
