//! Description marker protocol.
//!
//! The AI-generated section of a merge-request description is wrapped in a
//! paired HTML-comment marker so it can be found and replaced on a later run
//! without touching anything the author wrote by hand. Four independent
//! marker pairs exist — one per generated section — so a future section (say,
//! "architecture") can be added without disturbing "overview" or
//! "code-review".

/// One generated section kept in a merge-request description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionSection {
    Summary,
    Overview,
    Architecture,
    CodeReview,
}

impl DescriptionSection {
    fn marker_name(self) -> &'static str {
        match self {
            DescriptionSection::Summary => "ai-desc",
            DescriptionSection::Overview => "ai-overview",
            DescriptionSection::Architecture => "ai-architecture",
            DescriptionSection::CodeReview => "ai-code-review",
        }
    }

    fn start_marker(self) -> String {
        format!("<!-- {}-start -->", self.marker_name())
    }

    fn end_marker(self) -> String {
        format!("<!-- {}-end -->", self.marker_name())
    }
}

/// All four marker start tags, used to recognise "this comment/description
/// contains an AI-generated section" regardless of which section it is.
pub const ALL_START_MARKERS: &[&str] = &[
    "<!-- ai-desc-start -->",
    "<!-- ai-overview-start -->",
    "<!-- ai-architecture-start -->",
    "<!-- ai-code-review-start -->",
];

/// Replaces the region between `section`'s start/end markers in `existing`
/// with `new_content`, or — if the markers aren't present yet — prepends a
/// fresh marked block, separated from whatever text `existing` already had by
/// a horizontal rule.
pub fn apply_section(existing: &str, section: DescriptionSection, new_content: &str) -> String {
    let start = section.start_marker();
    let end = section.end_marker();
    let block = format!("{start}\n{new_content}\n{end}");

    if let (Some(start_idx), Some(end_idx)) = (existing.find(&start), existing.find(&end)) {
        if end_idx > start_idx {
            let tail_start = end_idx + end.len();
            let mut out = String::with_capacity(existing.len() + new_content.len());
            out.push_str(&existing[..start_idx]);
            out.push_str(&block);
            out.push_str(&existing[tail_start..]);
            return out;
        }
    }

    if existing.trim().is_empty() {
        block
    } else {
        format!("{block}\n\n---\n\n{}", existing.trim_start())
    }
}

/// Whether `body` (an MR description or a standalone comment) carries any
/// AI-generated section at all. Used to exclude bot-authored text when
/// scanning for genuine author comments.
pub fn contains_ai_marker(body: &str) -> bool {
    ALL_START_MARKERS.iter().any(|m| body.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_a_fresh_block_when_no_existing_description() {
        let out = apply_section("", DescriptionSection::Summary, "generated text");
        assert_eq!(out, "<!-- ai-desc-start -->\ngenerated text\n<!-- ai-desc-end -->");
    }

    #[test]
    fn prepends_separated_by_a_horizontal_rule_when_author_text_exists() {
        let out = apply_section("human-written notes", DescriptionSection::Summary, "generated text");
        assert!(out.starts_with("<!-- ai-desc-start -->\ngenerated text\n<!-- ai-desc-end -->\n\n---\n\n"));
        assert!(out.ends_with("human-written notes"));
    }

    #[test]
    fn replaces_in_place_when_markers_already_present() {
        let existing = "before\n<!-- ai-desc-start -->\nold\n<!-- ai-desc-end -->\nafter";
        let out = apply_section(existing, DescriptionSection::Summary, "new");
        assert_eq!(
            out,
            "before\n<!-- ai-desc-start -->\nnew\n<!-- ai-desc-end -->\nafter"
        );
    }

    #[test]
    fn distinct_sections_do_not_clobber_each_other() {
        let existing = apply_section("", DescriptionSection::Summary, "summary v1");
        let existing = apply_section(&existing, DescriptionSection::Overview, "overview v1");
        let updated = apply_section(&existing, DescriptionSection::Summary, "summary v2");
        assert!(updated.contains("summary v2"));
        assert!(updated.contains("overview v1"));
        assert!(!updated.contains("summary v1"));
    }

    #[test]
    fn contains_ai_marker_detects_any_section() {
        assert!(contains_ai_marker("text <!-- ai-overview-start -->x<!-- ai-overview-end -->"));
        assert!(!contains_ai_marker("a plain human comment"));
    }
}
