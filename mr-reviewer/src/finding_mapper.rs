//! Finding Mapper.
//!
//! Takes the `LanguageModel`'s raw `Finding`s (file path + line numbers in
//! the *new* file's coordinate space) and the parsed diff for each file, and
//! produces the `PlacedFinding`s a `CodeProvider::create_comment` call can
//! actually use, dropping anything that can't be placed and recording why.

use std::collections::HashMap;

use crate::model::{DroppedFinding, Finding, PlacedFinding};
use crate::parser;

/// Per-file index built once from a `FileDiff`'s unified diff text, reused
/// for every finding reported against that file.
pub struct FileDiffIndex {
    line_to_position: HashMap<usize, u32>,
    added_lines: std::collections::HashSet<usize>,
    old_line_for: HashMap<usize, u32>,
    max_mapped_new_line: Option<usize>,
    language_tag: String,
}

impl FileDiffIndex {
    pub fn build(diff_text: &str, language_tag: &str) -> Self {
        let lines = parser::parse_diff_lines(diff_text);
        let line_to_position = parser::line_to_position(&lines);
        let added_lines: std::collections::HashSet<usize> =
            parser::added_new_lines(&lines).into_iter().collect();
        let old_line_for = lines
            .iter()
            .filter_map(|l| match (l.new_line, l.old_line) {
                (Some(n), Some(o)) => Some((n as usize, o)),
                _ => None,
            })
            .collect();
        let max_mapped_new_line = line_to_position.keys().copied().max();
        Self {
            line_to_position,
            added_lines,
            old_line_for,
            max_mapped_new_line,
            language_tag: language_tag.to_string(),
        }
    }
}

/// Maps every `Finding` to either a `PlacedFinding` or a `DroppedFinding`,
/// per file, using the pre-built `FileDiffIndex` for that file's path.
///
/// Placement rules:
/// - A finding whose file has no diff index (not part of this review) is
///   dropped: "file not part of the diff".
/// - A finding whose `start_line` is not an added new-line is dropped:
///   "line not an added line in the diff" — the platform only accepts
///   comments on lines the author actually changed, so a finding anchored
///   to an unchanged context line is not placeable either.
/// - A finding spanning a range (`end_line > start_line`) has its
///   `end_line` clamped to the maximum mapped new-line for that file.
/// - The placed comment's `old_line` is always `None` for an added line
///   (pure additions carry no old-side line number); the provider
///   interprets that as "new line only".
pub fn map_findings(
    findings: Vec<Finding>,
    diff_indices: &HashMap<String, FileDiffIndex>,
) -> (Vec<PlacedFinding>, Vec<DroppedFinding>) {
    let mut placed = Vec::new();
    let mut dropped = Vec::new();

    for mut finding in findings {
        let Some(index) = diff_indices.get(&finding.file_path) else {
            dropped.push(DroppedFinding {
                file_path: finding.file_path.clone(),
                start_line: finding.start_line,
                reason: "file not part of the diff".to_string(),
            });
            continue;
        };

        if !index.added_lines.contains(&finding.start_line) {
            dropped.push(DroppedFinding {
                file_path: finding.file_path.clone(),
                start_line: finding.start_line,
                reason: "line not an added line in the diff".to_string(),
            });
            continue;
        }

        let Some(&position) = index.line_to_position.get(&finding.start_line) else {
            dropped.push(DroppedFinding {
                file_path: finding.file_path.clone(),
                start_line: finding.start_line,
                reason: "line not visible in the diff".to_string(),
            });
            continue;
        };

        if let Some(end) = finding.end_line {
            if end > finding.start_line {
                if let Some(max_new_line) = index.max_mapped_new_line {
                    finding.end_line = Some(end.min(max_new_line));
                }
            }
        }

        let old_line = index.old_line_for.get(&finding.start_line).copied();

        placed.push(PlacedFinding {
            language_tag: index.language_tag.clone(),
            finding,
            position,
            old_line,
        });
    }

    (placed, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_finding(file_path: &str, start_line: usize) -> Finding {
        Finding {
            file_path: file_path.to_string(),
            start_line,
            end_line: None,
            issue_kind: "bug".to_string(),
            impact: "low".to_string(),
            priority: "minor".to_string(),
            confidence: 0.8,
            title: "t".to_string(),
            description: "d".to_string(),
            suggestion: None,
            code_snippet: None,
        }
    }

    #[test]
    fn places_finding_on_added_line() {
        let diff = "@@ -1,2 +1,3 @@\n a\n+b\n c";
        let mut indices = HashMap::new();
        indices.insert("f.rs".to_string(), FileDiffIndex::build(diff, "rust"));
        let (placed, dropped) = map_findings(vec![make_finding("f.rs", 2)], &indices);
        assert!(dropped.is_empty());
        assert_eq!(placed[0].position, 2);
        assert_eq!(placed[0].old_line, None);
    }

    #[test]
    fn drops_finding_for_file_not_in_diff() {
        let indices = HashMap::new();
        let (placed, dropped) = map_findings(vec![make_finding("other.rs", 1)], &indices);
        assert!(placed.is_empty());
        assert_eq!(dropped[0].reason, "file not part of the diff");
    }

    #[test]
    fn drops_finding_on_line_outside_any_hunk() {
        let diff = "@@ -1,2 +1,3 @@\n a\n+b\n c";
        let mut indices = HashMap::new();
        indices.insert("f.rs".to_string(), FileDiffIndex::build(diff, "rust"));
        let (placed, dropped) = map_findings(vec![make_finding("f.rs", 50)], &indices);
        assert!(placed.is_empty());
        assert_eq!(dropped[0].reason, "line not an added line in the diff");
    }

    #[test]
    fn drops_finding_anchored_on_a_context_line() {
        // The platform only accepts comments on lines the author actually
        // changed, so an unmodified context line is not placeable even
        // though it has a `position` in the diff.
        let diff = "@@ -1,2 +1,3 @@\n a\n+b\n c";
        let mut indices = HashMap::new();
        indices.insert("f.rs".to_string(), FileDiffIndex::build(diff, "rust"));
        let (placed, dropped) = map_findings(vec![make_finding("f.rs", 1)], &indices);
        assert!(placed.is_empty());
        assert_eq!(dropped[0].reason, "line not an added line in the diff");
    }

    #[test]
    fn added_line_never_carries_an_old_line() {
        let diff = "@@ -1,2 +1,3 @@\n a\n+b\n c";
        let mut indices = HashMap::new();
        indices.insert("f.rs".to_string(), FileDiffIndex::build(diff, "rust"));
        let (placed, _dropped) = map_findings(vec![make_finding("f.rs", 2)], &indices);
        assert_eq!(placed[0].old_line, None);
    }

    #[test]
    fn clamps_end_line_to_the_diffs_max_mapped_new_line() {
        // Added new-lines {10, 11, 12}, finding spans start=11..end=50,
        // mapper publishes end=12.
        let diff = "@@ -9,1 +9,4 @@\n ctx\n+ten\n+eleven\n+twelve";
        let mut indices = HashMap::new();
        indices.insert("f.rs".to_string(), FileDiffIndex::build(diff, "rust"));
        let mut finding = make_finding("f.rs", 11);
        finding.end_line = Some(50);
        let (placed, dropped) = map_findings(vec![finding], &indices);
        assert!(dropped.is_empty());
        assert_eq!(placed[0].finding.end_line, Some(12));
    }
}
