//! Cross-file Symbol Resolver.
//!
//! `crate::tree::extract_symbol` builds a `Symbol` with empty `dependencies`
//! and `callers` — it only sees one file's tree. This module owns the two
//! passes that fill those edges in, both searching the *whole*
//! `RepositorySnapshot` the orchestrator fetched, not just the files that
//! happened to be in the diff: a same-file → same-directory → whole-repo
//! fallback for dependency definitions, and a text-prefilter-then-AST-walk
//! pass for callers.
//!
//! Matching is name-based, not type-based: there is no real type-checker
//! here. `names_match` implements four equivalence rules for comparing a
//! call expression against a candidate definition.

use crate::assembler;
use crate::lang::{self, Language};
use crate::model::{Caller, Dependency, RepositoryFile, RepositorySnapshot, Symbol, SymbolKind};
use crate::tree::{self, TreeCache};
use tree_sitter::Node;

/// Self-reference tokens filtered out before they're ever considered a
/// dependency candidate.
const SELF_REFS: &[&str] = &["this", "self", "super", "base"];

/// Common loop-variable names filtered for the same reason.
const LOOP_VAR_NAMES: &[&str] = &["i", "j", "k", "idx", "index", "temp", "val"];

/// Maximum body length (lines) kept verbatim on a resolved `Dependency`
/// before it's truncated to signature + a short preview.
const MAX_DEPENDENCY_BODY_LINES: usize = 20;
const TRUNCATED_BODY_LINES: usize = 10;

/// The file a symbol's own dependency edges are resolved *from* — its path,
/// content, and language, so the resolver can re-walk its tree for call
/// sites without re-fetching anything from the provider.
pub struct ResolverFile<'a> {
    pub path: &'a str,
    pub content: &'a str,
    pub language: Language,
}

/// Fills `dependencies` and `callers` on every symbol in `target_file`,
/// searching `snapshot` (the full repository tree at this commit, not just
/// the files that changed) for matching definitions and call sites. Returns
/// new `Symbol`s; does not mutate in place, since `tree::extract_symbol`
/// already produced owned values.
pub fn resolve_symbols(
    cache: &TreeCache,
    target_file: &ResolverFile<'_>,
    target_symbols: &[Symbol],
    snapshot: &RepositorySnapshot,
) -> Vec<Symbol> {
    target_symbols
        .iter()
        .map(|sym| {
            let mut resolved = sym.clone();
            resolved.dependencies = resolve_dependencies(cache, target_file, sym, snapshot).unwrap_or_default();
            resolved.callers = find_callers(cache, sym, snapshot);
            resolved
        })
        .collect()
}

/// Walks `symbol`'s own body for call/reference expressions and resolves
/// each candidate name against the snapshot. Stdlib-prefixed,
/// self-referential, too-short, and loop-variable names are filtered before
/// a lookup is even attempted.
fn resolve_dependencies(
    cache: &TreeCache,
    target_file: &ResolverFile<'_>,
    symbol: &Symbol,
    snapshot: &RepositorySnapshot,
) -> Option<Vec<Dependency>> {
    let rules = lang::rules_for(target_file.language);
    let names = cache
        .with_tree(
            target_file.path,
            target_file.content,
            target_file.language,
            |parsed_tree| {
                let root = parsed_tree.root_node();
                // `smallest_enclosing_node` on the symbol's own start row lands
                // on whatever leaf is deepest there — typically the `fn`/`func`
                // keyword or the name token, not the body. Walk back up to the
                // nearest symbol-defining ancestor (the symbol node itself, since
                // that's what encloses its own first row) before collecting
                // calls, so the whole body subtree is actually walked.
                let leaf = tree::smallest_enclosing_node(root, symbol.start_line - 1);
                let body_node =
                    tree::nearest_symbol_ancestor(target_file.language, leaf).unwrap_or(leaf);
                collect_call_names(target_file.language, body_node, target_file.content)
            },
        )
        .ok()??;

    let mut deps = Vec::new();
    for (name, line) in names {
        if should_filter(&name, rules) {
            continue;
        }
        let cleaned = clean_name(&name);
        match find_definition(cache, &cleaned, target_file.path, snapshot) {
            Some((def_file, def_symbol)) => {
                deps.push(Dependency {
                    name,
                    line,
                    kind: def_symbol.kind,
                    source_file: def_file.to_string(),
                    source_code: Some(truncate_body(&def_symbol.body)),
                    doc: non_empty(&def_symbol.doc_comment),
                });
            }
            None => {
                deps.push(Dependency {
                    name,
                    line,
                    kind: SymbolKind::Unknown,
                    source_file: String::new(),
                    source_code: None,
                    doc: None,
                });
            }
        }
    }
    Some(deps)
}

/// Takes the segment after the last `.`, so a qualified call like
/// `pkg.Helper` is looked up as `Helper`.
fn clean_name(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_string()
}

/// Resolves a dependency's defining file: same file first, then same
/// directory, then the rest of the snapshot. Each
/// stage parses its candidate files on demand (via the shared `TreeCache`,
/// so repeat lookups against the same file are free) and looks for a
/// top-level symbol whose extracted name equals `cleaned_name`.
fn find_definition<'a>(
    cache: &TreeCache,
    cleaned_name: &str,
    from_path: &str,
    snapshot: &'a RepositorySnapshot,
) -> Option<(&'a str, Symbol)> {
    if let Some(file) = snapshot.file(from_path) {
        if let Some(sym) = find_definition_in_file(cache, cleaned_name, file) {
            return Some((file.path.as_str(), sym));
        }
    }

    for file in snapshot.siblings_of(from_path) {
        if let Some(sym) = find_definition_in_file(cache, cleaned_name, file) {
            return Some((file.path.as_str(), sym));
        }
    }

    for file in &snapshot.files {
        if file.path == from_path || parent_dir(&file.path) == parent_dir(from_path) {
            continue;
        }
        if let Some(sym) = find_definition_in_file(cache, cleaned_name, file) {
            return Some((file.path.as_str(), sym));
        }
    }

    None
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn find_definition_in_file(cache: &TreeCache, cleaned_name: &str, file: &RepositoryFile) -> Option<Symbol> {
    if file.is_binary {
        return None;
    }
    assembler::extract_all_symbols(cache, &file.path, &file.content)
        .ok()?
        .into_iter()
        .find(|sym| sym.name == cleaned_name)
}

/// Finds every symbol, in any file of `snapshot`, whose body calls `symbol`
/// by name.
///
/// Candidate-file prefilter: a file is a candidate iff its text contains
/// `symbol.name` as a substring; the symbol's own defining file is only a
/// candidate when its kind is `Function`/`Method` and the content contains
/// `"<name>("` (so a struct/type's bare name appearing in an unrelated
/// comment or string doesn't trigger a full parse).
fn find_callers(cache: &TreeCache, symbol: &Symbol, snapshot: &RepositorySnapshot) -> Vec<Caller> {
    let mut callers = Vec::new();
    let call_paren = format!("{}(", symbol.name);

    for file in &snapshot.files {
        if file.is_binary || !file.content.contains(&symbol.name) {
            continue;
        }
        if file.path == symbol.file_path
            && !matches!(symbol.kind, SymbolKind::Function | SymbolKind::Method)
        {
            continue;
        }
        if file.path == symbol.file_path && !file.content.contains(&call_paren) {
            continue;
        }

        let language = lang::classify(&file.path);
        let matches = cache
            .with_tree(&file.path, &file.content, language, |tree| {
                collect_call_names(language, tree.root_node(), &file.content)
            })
            .ok()
            .flatten()
            .unwrap_or_default();

        for (call_name, line) in matches {
            if !names_match(&call_name, &symbol.name) {
                continue;
            }
            let containing_function = cache
                .with_tree(&file.path, &file.content, language, |tree| {
                    let enclosing = tree::smallest_enclosing_node(tree.root_node(), line.saturating_sub(1));
                    tree::nearest_symbol_ancestor(language, enclosing)
                        .and_then(|n| tree::name_of(language, n, &file.content))
                })
                .ok()
                .flatten()
                .flatten()
                .unwrap_or_else(|| "global".to_string());

            callers.push(Caller {
                file_path: file.path.clone(),
                line,
                containing_function,
                snippet: snippet_around(&file.content, line),
            });
        }
    }
    callers
}

/// Walks the tree rooted at `body_node`, collecting `(name, line)` pairs for
/// every node whose type matches a call-expression substring for `language`.
fn collect_call_names(language: Language, body_node: Node<'_>, content: &str) -> Vec<(String, usize)> {
    let rules = lang::rules_for(language);
    let mut out = Vec::new();
    for node in tree::preorder(body_node) {
        if rules
            .call_node_type_substrings
            .iter()
            .any(|s| node.kind().contains(s))
        {
            if let Some(name) = call_expression_name(node, content) {
                out.push((name, node.start_position().row + 1));
            }
        }
    }
    out
}

/// Extracts the callee name from a call-expression node: prefers the
/// `function`/`callee` field, falling back to the node's first identifier
/// child and finally its own text if neither yields anything narrower.
fn call_expression_name(node: Node<'_>, content: &str) -> Option<String> {
    for field in ["function", "callee", "name"] {
        if let Some(n) = node.child_by_field_name(field) {
            return Some(node_text(content, n));
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(
            child.kind(),
            "identifier" | "field_identifier" | "scoped_identifier" | "member_expression"
        ) {
            return Some(node_text(content, child));
        }
    }
    None
}

fn node_text(content: &str, node: Node<'_>) -> String {
    content
        .get(node.start_byte()..node.end_byte())
        .unwrap_or_default()
        .to_string()
}

/// Name-equivalence rules for matching a call expression against a symbol
/// definition: exact equality; `call_name` ends with
/// `.symbol_name`; any dot-segment of `call_name` equals `symbol_name`;
/// `call_name` ends with `symbol_name` preceded by `.` or whitespace.
fn names_match(call_name: &str, symbol_name: &str) -> bool {
    if call_name == symbol_name {
        return true;
    }
    if call_name.ends_with(&format!(".{symbol_name}")) {
        return true;
    }
    if call_name.split('.').any(|seg| seg == symbol_name) {
        return true;
    }
    if let Some(idx) = call_name.len().checked_sub(symbol_name.len()) {
        if call_name[idx..] == *symbol_name {
            let boundary = call_name[..idx].chars().last();
            if matches!(boundary, Some('.') | Some(' ') | Some('\t') | None) {
                return true;
            }
        }
    }
    false
}

/// Whether `name` should never be considered a dependency candidate (spec
/// §4.3): stdlib-prefixed, a self-reference token, too short, a common loop
/// variable, or with no alphanumeric content at all.
fn should_filter(name: &str, rules: &lang::LanguageRules) -> bool {
    if name.len() < 3 {
        return true;
    }
    if SELF_REFS.contains(&name) || LOOP_VAR_NAMES.contains(&name) {
        return true;
    }
    if !name.chars().any(|c| c.is_alphanumeric()) {
        return true;
    }
    if rules.stdlib_prefixes.iter().any(|p| name.starts_with(p)) {
        return true;
    }
    false
}

/// Truncates an oversized dependency body to its signature line plus the
/// first `TRUNCATED_BODY_LINES` body lines, with a closing marker (spec
/// §4.5).
fn truncate_body(body: &str) -> String {
    let lines: Vec<&str> = body.lines().collect();
    if lines.len() <= MAX_DEPENDENCY_BODY_LINES {
        return body.to_string();
    }
    let mut out = lines[..1.min(lines.len())].join("\n");
    out.push('\n');
    out.push_str(&lines[1..=TRUNCATED_BODY_LINES.min(lines.len().saturating_sub(1))].join("\n"));
    out.push_str("\n// ...\n}");
    out
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// A short window (up to 2 lines of context either side) around `line`
/// (1-based) inside `content`, used as a `Caller`'s human-readable preview.
fn snippet_around(content: &str, line: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if line == 0 || line > lines.len() {
        return String::new();
    }
    let start = line.saturating_sub(2).max(1);
    let end = (line + 2).min(lines.len());
    lines[(start - 1)..end].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RepositoryFile;

    fn snapshot(files: Vec<(&str, &str)>) -> RepositorySnapshot {
        RepositorySnapshot {
            commit_id: "abc".to_string(),
            files: files
                .into_iter()
                .map(|(path, content)| RepositoryFile {
                    path: path.to_string(),
                    content: content.to_string(),
                    is_binary: false,
                    mode: "100644".to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn names_match_handles_dotted_call_forms() {
        assert!(names_match("self.foo", "foo"));
        assert!(names_match("obj.bar.foo", "foo"));
        assert!(names_match("foo", "foo"));
        assert!(!names_match("foobar", "foo"));
    }

    #[test]
    fn names_match_requires_boundary_before_suffix() {
        assert!(names_match("pkg.Helper", "Helper"));
        assert!(!names_match("NotAHelper", "Helper"));
    }

    #[test]
    fn should_filter_rejects_short_and_loop_names() {
        let rules = lang::rules_for(Language::Rust);
        assert!(should_filter("i", rules));
        assert!(should_filter("self", rules));
        assert!(should_filter("std::fmt::Debug", rules));
        assert!(!should_filter("process_request", rules));
    }

    #[test]
    fn clean_name_takes_segment_after_last_dot() {
        assert_eq!(clean_name("pkg.sub.Helper"), "Helper");
        assert_eq!(clean_name("Helper"), "Helper");
    }

    #[test]
    fn truncate_body_keeps_short_bodies_verbatim() {
        let body = "fn foo() {\n  1\n}";
        assert_eq!(truncate_body(body), body);
    }

    #[test]
    fn truncate_body_cuts_long_bodies() {
        let body: String = std::iter::once("fn foo() {".to_string())
            .chain((0..30).map(|i| format!("  line {i}")))
            .collect::<Vec<_>>()
            .join("\n");
        let truncated = truncate_body(&body);
        assert!(truncated.lines().count() < body.lines().count());
        assert!(truncated.ends_with("}"));
    }

    #[test]
    fn resolves_dependency_defined_in_an_unchanged_sibling_file() {
        // The symbol calling `normalise` never changed in this diff; only
        // its caller did. The resolver must still find it by scanning the
        // whole snapshot, not just the assembled/changed files.
        let cache = TreeCache::new();
        let snap = snapshot(vec![
            ("src/util.rs", "fn normalise(s: &str) -> String {\n    s.to_string()\n}\n"),
            ("src/handler.rs", "fn handle() {\n    normalise(\"x\");\n}\n"),
        ]);
        let handler = snap.file("src/handler.rs").unwrap();
        let target = ResolverFile {
            path: &handler.path,
            content: &handler.content,
            language: Language::Rust,
        };
        let symbols = assembler::extract_all_symbols(&cache, &handler.path, &handler.content).unwrap();
        let resolved = resolve_symbols(&cache, &target, &symbols, &snap);

        let handle = resolved.iter().find(|s| s.name == "handle").unwrap();
        let dep = handle.dependencies.iter().find(|d| d.name == "normalise").unwrap();
        assert_eq!(dep.source_file, "src/util.rs");
        assert!(!dep.is_external());
    }

    #[test]
    fn finds_caller_in_a_file_that_never_changed() {
        let cache = TreeCache::new();
        let snap = snapshot(vec![
            ("src/util.rs", "fn normalise(s: &str) -> String {\n    s.to_string()\n}\n"),
            ("src/handler.rs", "fn handle() {\n    normalise(\"x\");\n}\n"),
        ]);
        let util = snap.file("src/util.rs").unwrap();
        let symbols = assembler::extract_all_symbols(&cache, &util.path, &util.content).unwrap();
        let normalise = symbols.into_iter().find(|s| s.name == "normalise").unwrap();

        let callers = find_callers(&cache, &normalise, &snap);
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].file_path, "src/handler.rs");
        assert_eq!(callers[0].containing_function, "handle");
    }
}
