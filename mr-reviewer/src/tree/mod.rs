//! Syntax Tree Service.
//!
//! One parser per call, mirroring `codegraph-prep::core::parse::parse_and_extract`:
//! no parser pool, just a fresh `tree_sitter::Parser` per file. What's new here
//! is the single-flight cache in front of it — the Resolver and the Context
//! Assembler both want the same file's tree during one run, and re-parsing a
//! large file twice per request is wasted work: each changed/context file
//! is parsed at most once per request.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use tree_sitter::{Node, Parser, Tree};

use crate::errors::{CacheError, MrResult};
use crate::lang::{self, Language};
use crate::model::{Symbol, SymbolKind};

/// Per-request cache keyed by `(path, content hash)` so a stale entry from an
/// earlier revision of the same path is never returned.
pub struct TreeCache {
    trees: Mutex<HashMap<(String, u64), Tree>>,
}

impl TreeCache {
    pub fn new() -> Self {
        Self {
            trees: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `f` against the parsed tree for `(path, content)`, parsing and
    /// caching it first if this is the first request for that exact content.
    /// Returns `Ok(None)` when `language` has no grammar wired (a
    /// recoverable signal, not a failure) or the grammar failed to parse.
    pub fn with_tree<R>(
        &self,
        path: &str,
        content: &str,
        language: Language,
        f: impl FnOnce(&Tree) -> R,
    ) -> MrResult<Option<R>> {
        let Some(grammar) = lang::grammar(language) else {
            return Ok(None);
        };
        let key = (path.to_string(), content_hash(content));

        let mut guard = self.trees.lock().map_err(|_| CacheError::Poisoned)?;
        if let std::collections::hash_map::Entry::Vacant(e) = guard.entry(key.clone()) {
            match parse_tree(grammar, content) {
                Some(tree) => {
                    e.insert(tree);
                }
                None => return Ok(None),
            }
        }
        let tree = guard.get(&key).expect("just inserted or already present");
        Ok(Some(f(tree)))
    }
}

impl Default for TreeCache {
    fn default() -> Self {
        Self::new()
    }
}

fn content_hash(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

fn parse_tree(grammar: tree_sitter::Language, content: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser.set_language(&grammar).ok()?;
    parser.parse(content, None)
}

/// Descends from `root`, at each level picking the child whose row range
/// contains `line0` (0-based), until no child contains it. The returned node
/// is the smallest node that still spans `line0`.
pub fn smallest_enclosing_node(root: Node<'_>, line0: usize) -> Node<'_> {
    let mut current = root;
    loop {
        let mut cursor = current.walk();
        let mut found = None;
        for child in current.children(&mut cursor) {
            if child.start_position().row <= line0 && line0 <= child.end_position().row {
                found = Some(child);
                break;
            }
        }
        match found {
            Some(child) => current = child,
            None => break,
        }
    }
    current
}

/// Walks up from `node` until it reaches a symbol-defining node for
/// `language`, or runs out of ancestors.
pub fn nearest_symbol_ancestor<'a>(language: Language, node: Node<'a>) -> Option<Node<'a>> {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if lang::is_symbol_defining(Some(language), n.kind()) {
            return Some(n);
        }
        cur = n.parent();
    }
    None
}

/// Builds a `Symbol` from a symbol-defining node. `package` and the resolved
/// `dependencies`/`callers` edges are left empty; the Cross-file Resolver
/// fills those in once it has the whole repository snapshot in hand.
pub fn extract_symbol(language: Language, node: Node<'_>, path: &str, content: &str) -> Symbol {
    let rules = lang::rules_for(language);
    let kind = lang::symbol_kind_for(language, node.kind());
    let name = pick_name(node, rules, content).unwrap_or_else(|| "<anonymous>".to_string());

    Symbol {
        name,
        kind,
        file_path: path.to_string(),
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        body: node_text(content, node).to_string(),
        doc_comment: gather_leading_doc(content, node.start_position().row),
        signature: cut_signature(node_text(content, node)),
        package: String::new(),
        dependencies: Vec::new(),
        callers: Vec::new(),
    }
}

/// Public wrapper around `pick_name` for callers outside this module (the
/// Resolver needs a symbol-defining node's name when matching a call target
/// against candidate definitions).
pub fn name_of(language: Language, node: Node<'_>, content: &str) -> Option<String> {
    pick_name(node, lang::rules_for(language), content)
}

/// Pre-order walk of every node in the subtree rooted at `root`, including
/// `root` itself. The Resolver uses this to scan a symbol's body for call
/// expressions and identifier references without hand-rolling a cursor walk
/// at every call site.
pub fn preorder(root: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let mut cursor = root.walk();
    let mut visited_children = false;
    loop {
        if !visited_children {
            out.push(cursor.node());
            if cursor.goto_first_child() {
                continue;
            }
            visited_children = true;
        }
        if cursor.goto_next_sibling() {
            visited_children = false;
            continue;
        }
        if !cursor.goto_parent() {
            break;
        }
    }
    out
}

fn pick_name(node: Node<'_>, rules: &lang::LanguageRules, content: &str) -> Option<String> {
    for field in rules.name_field_candidates {
        if let Some(n) = node.child_by_field_name(field) {
            return Some(node_text(content, n).to_string());
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if rules.name_node_kind_candidates.contains(&child.kind()) {
            return Some(node_text(content, child).to_string());
        }
    }
    None
}

fn node_text<'a>(content: &'a str, node: Node<'_>) -> &'a str {
    content
        .get(node.start_byte()..node.end_byte())
        .unwrap_or_default()
}

/// Signature is the node's own text truncated at the first body/terminator
/// marker (`{`, `;`, or `=>`), mirroring the brace/semi/arrow cut-point
/// `codegraph-prep::languages::dart::docsig` uses for Dart declarations.
fn cut_signature(full: &str) -> String {
    let brace = full.find('{');
    let semi = full.find(';');
    let arrow = full.find("=>");
    let cut = [brace, semi, arrow].into_iter().flatten().min();
    match cut {
        Some(p) => full[..p].trim().to_string(),
        None => full.trim().to_string(),
    }
}

/// Comment introducers recognised by doc-comment extraction: line
/// comments, block-comment openers, and the two triple-quote docstring
/// styles.
const DOC_COMMENT_INTRODUCERS: &[&str] = &["///", "//!", "//", "/**", "/*", "#", "\"\"\"", "'''"];

const MAX_DOC_COMMENT_LINES: usize = 10;

/// Walks lines backward from `start_row - 1` (0-based), skipping blank
/// lines, and collects consecutive lines whose trimmed prefix is a comment
/// introducer. Stops at the first non-comment, non-blank line or once 10
/// lines have been collected. Returned in original
/// (top-to-bottom) order.
fn gather_leading_doc(content: &str, start_row: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if start_row == 0 {
        return String::new();
    }
    let mut acc = Vec::new();
    let mut i = start_row;
    while i > 0 && acc.len() < MAX_DOC_COMMENT_LINES {
        i -= 1;
        let line = lines[i].trim();
        if line.is_empty() {
            continue;
        }
        match DOC_COMMENT_INTRODUCERS.iter().find(|intro| line.starts_with(**intro)) {
            Some(intro) => acc.push(line[intro.len()..].trim_start_matches('*').trim().to_string()),
            None => break,
        }
    }
    acc.reverse();
    acc.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cut_signature_stops_at_first_brace() {
        assert_eq!(cut_signature("fn foo(x: i32) -> i32 {\n  x\n}"), "fn foo(x: i32) -> i32");
    }

    #[test]
    fn cut_signature_stops_at_semicolon_for_declarations() {
        assert_eq!(cut_signature("const MAX: usize = 10;"), "const MAX: usize = 10");
    }

    #[test]
    fn gather_leading_doc_joins_contiguous_line_comments() {
        let content = "// first\n// second\nfn foo() {}\n";
        assert_eq!(gather_leading_doc(content, 2), "first\nsecond");
    }

    #[test]
    fn gather_leading_doc_skips_blank_lines_between_comment_and_declaration() {
        let content = "// stale note\n\nfn foo() {}\n";
        assert_eq!(gather_leading_doc(content, 2), "stale note");
    }

    #[test]
    fn gather_leading_doc_stops_at_first_non_comment_line() {
        let content = "let unrelated = 1;\n// only this line\nfn foo() {}\n";
        assert_eq!(gather_leading_doc(content, 2), "only this line");
    }

    #[test]
    fn gather_leading_doc_recognises_block_and_docstring_introducers() {
        let content = "/** block doc */\nfn foo() {}\n";
        assert_eq!(gather_leading_doc(content, 1), "block doc */");

        let python = "\"\"\"docstring\"\"\"\ndef foo():\n    pass\n";
        assert_eq!(gather_leading_doc(python, 1), "docstring\"\"\"");
    }

    #[test]
    fn gather_leading_doc_caps_at_ten_lines() {
        let mut content = String::new();
        for i in 0..15 {
            content.push_str(&format!("// line {i}\n"));
        }
        content.push_str("fn foo() {}\n");
        let doc = gather_leading_doc(&content, 15);
        assert_eq!(doc.lines().count(), 10);
        assert!(doc.ends_with("line 14"));
    }

    #[test]
    fn preorder_visits_root_first_and_covers_every_descendant() {
        let grammar = tree_sitter_rust::LANGUAGE.into();
        let mut parser = Parser::new();
        parser.set_language(&grammar).unwrap();
        let code = "fn foo() {\n    let x = 1;\n    bar(x);\n}\n";
        let tree = parser.parse(code, None).unwrap();
        let nodes = preorder(tree.root_node());
        assert_eq!(nodes[0].kind(), "source_file");
        assert!(nodes.iter().any(|n| n.kind() == "call_expression"));
        assert!(nodes.len() > 5);
    }

    #[test]
    fn smallest_enclosing_node_descends_to_leaf_level() {
        let grammar = tree_sitter_rust::LANGUAGE.into();
        let mut parser = Parser::new();
        parser.set_language(&grammar).unwrap();
        let code = "fn foo() {\n    let x = 1;\n}\n";
        let tree = parser.parse(code, None).unwrap();
        let node = smallest_enclosing_node(tree.root_node(), 1);
        assert!(node.start_position().row <= 1 && node.end_position().row >= 1);
        assert_ne!(node.kind(), "source_file");
    }
}
