//! Context Assembler.
//!
//! Turns a `ReviewFilterConfig`, a `FileDiff` list, and the base/head
//! `RepositorySnapshot`s into the `FileContext` list a `ContextBundle` is
//! built from. Filtering happens first (glob/extension/size/max-files), then
//! each surviving file is dispatched to a build function by `ChangeKind`:
//! added files only need the head content, deleted files only the base
//! content, modified/renamed files need both sides plus the diff text to
//! know which lines actually changed.

use globset::{Glob, GlobSetBuilder};

use crate::config::ReviewFilterConfig;
use crate::errors::MrResult;
use crate::lang::{self, Language};
use crate::model::{ChangeKind, FileContext, FileDiff, FilteredFile, RepositorySnapshot, Symbol};
use crate::parser;
use crate::tree::{self, TreeCache};

/// Splits `diffs` into files worth assembling and files filtered out with a
/// reason, applying the glob/extension/size/count rules in a fixed order:
/// excluded-path globs first, then extension allowlist, then per-file size,
/// then a global file-count cap.
pub fn filter_files(
    diffs: &[FileDiff],
    head: &RepositorySnapshot,
    cfg: &ReviewFilterConfig,
) -> (Vec<FileDiff>, Vec<FilteredFile>) {
    let mut excluded = GlobSetBuilder::new();
    for pattern in &cfg.excluded_path_globs {
        if let Ok(glob) = Glob::new(pattern) {
            excluded.add(glob);
        }
    }
    let excluded = match excluded.build() {
        Ok(set) => set,
        Err(_) => GlobSetBuilder::new().build().expect("empty globset always builds"),
    };

    let mut kept = Vec::new();
    let mut filtered = Vec::new();

    for diff in diffs {
        let path = diff.canonical_path();

        if excluded.is_match(path) {
            filtered.push(FilteredFile {
                file_path: path.to_string(),
                reason: "matched an excluded path glob".to_string(),
            });
            continue;
        }

        if diff.is_binary {
            filtered.push(FilteredFile {
                file_path: path.to_string(),
                reason: "binary file".to_string(),
            });
            continue;
        }

        if !is_configuration_file(path) && !extension_allowed(path, cfg) {
            filtered.push(FilteredFile {
                file_path: path.to_string(),
                reason: "extension not in the allowed list".to_string(),
            });
            continue;
        }

        if let Some(file) = head.file(path) {
            if file.content.len() as u64 > cfg.max_file_size_bytes {
                filtered.push(FilteredFile {
                    file_path: path.to_string(),
                    reason: "exceeds max file size".to_string(),
                });
                continue;
            }
        }

        kept.push(diff.clone());
    }

    if kept.len() > cfg.max_files {
        let overflow = kept.split_off(cfg.max_files);
        filtered.extend(overflow.into_iter().map(|d| FilteredFile {
            file_path: d.canonical_path().to_string(),
            reason: "exceeds max_files for this run".to_string(),
        }));
    }

    (kept, filtered)
}

fn extension_allowed(path: &str, cfg: &ReviewFilterConfig) -> bool {
    let ext = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext {
        Some(ext) => cfg.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

/// Config/manifest files carry no source-language extension but are still
/// worth surfacing as plain-text context: build tooling,
/// dependency manifests, and CI descriptors.
pub fn is_configuration_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    matches!(
        name,
        "Cargo.toml"
            | "Cargo.lock"
            | "package.json"
            | "go.mod"
            | "go.sum"
            | "Dockerfile"
            | "docker-compose.yml"
            | "docker-compose.yaml"
            | ".gitlab-ci.yml"
            | ".github"
    ) || path.starts_with(".github/workflows/")
}

/// Builds the `FileContext` for one surviving `FileDiff`, dispatching on
/// `ChangeKind`. `cache` is shared across the whole run's file fan-out so a
/// file referenced both as a changed file and a resolver-visited sibling is
/// parsed only once.
pub fn assemble_file(
    cache: &TreeCache,
    diff: &FileDiff,
    base: &RepositorySnapshot,
    head: &RepositorySnapshot,
) -> MrResult<FileContext> {
    match diff.kind {
        ChangeKind::New => build_added(cache, diff, head),
        ChangeKind::Deleted => build_deleted(cache, diff, base),
        ChangeKind::Renamed | ChangeKind::Modified => build_modified(cache, diff, base, head),
    }
}

fn build_added(cache: &TreeCache, diff: &FileDiff, head: &RepositorySnapshot) -> MrResult<FileContext> {
    let path = diff.canonical_path();
    let mut ctx = FileContext::stub(path.to_string(), diff.kind);
    let Some(file) = head.file(path) else {
        return Ok(ctx);
    };
    ctx.symbols = extract_all_symbols(cache, path, &file.content)?;
    Ok(ctx)
}

fn build_deleted(cache: &TreeCache, diff: &FileDiff, base: &RepositorySnapshot) -> MrResult<FileContext> {
    let path = diff.canonical_path();
    let mut ctx = FileContext::stub(path.to_string(), diff.kind);
    let Some(file) = base.file(path) else {
        return Ok(ctx);
    };
    ctx.symbols = extract_all_symbols(cache, path, &file.content)?;
    Ok(ctx)
}

fn build_modified(
    cache: &TreeCache,
    diff: &FileDiff,
    base: &RepositorySnapshot,
    head: &RepositorySnapshot,
) -> MrResult<FileContext> {
    let path = diff.canonical_path();
    let mut ctx = FileContext::stub(path.to_string(), diff.kind);
    let Some(file) = head.file(path) else {
        // Renamed-away or otherwise absent on head; fall back to base so the
        // review still has something to show rather than an empty entry.
        if let Some(old) = base.file(&diff.old_path) {
            ctx.symbols = extract_all_symbols(cache, &diff.old_path, &old.content)?;
        }
        return Ok(ctx);
    };
    let all_symbols = extract_all_symbols(cache, path, &file.content)?;
    ctx.symbols = affected_symbols(&diff.unified_diff, all_symbols);
    Ok(ctx)
}

/// Narrows `all_symbols` (every top-level symbol in the file) down to the
/// ones an edit actually touched: any symbol whose inclusive line range
/// contains at least one added new-line. Applies to modified/renamed files
/// only; added/deleted files keep every symbol since there's no prior
/// revision to diff against.
fn affected_symbols(unified_diff: &str, all_symbols: Vec<Symbol>) -> Vec<Symbol> {
    let diff_lines = parser::parse_diff_lines(unified_diff);
    let added: Vec<usize> = parser::added_new_lines(&diff_lines);
    if added.is_empty() {
        return Vec::new();
    }
    all_symbols
        .into_iter()
        .filter(|sym| added.iter().any(|&line| sym.contains_line(line)))
        .collect()
}

/// Parses `content` for `path`'s language and extracts one `Symbol` per
/// top-level symbol-defining node. Text-only languages (no grammar wired)
/// yield an empty symbol list; the caller still has the diff itself.
pub fn extract_all_symbols(cache: &TreeCache, path: &str, content: &str) -> MrResult<Vec<Symbol>> {
    let language = lang::classify(path);
    let symbols = cache.with_tree(path, content, language, |tree| {
        top_level_symbol_nodes(language, tree.root_node())
            .into_iter()
            .map(|node| tree::extract_symbol(language, node, path, content))
            .collect::<Vec<_>>()
    })?;
    Ok(symbols.unwrap_or_default())
}

/// Direct children of the tree root that are symbol-defining for `language`.
/// Deliberately shallow: nested/local symbols are reachable through the
/// resolver's body walk, not re-extracted as top-level entries.
fn top_level_symbol_nodes(language: Language, root: tree_sitter::Node<'_>) -> Vec<tree_sitter::Node<'_>> {
    let mut cursor = root.walk();
    root.children(&mut cursor)
        .filter(|n| lang::is_symbol_defining(Some(language), n.kind()))
        .collect()
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
    fn filter_files_excludes_glob_matches() {
        let cfg = ReviewFilterConfig::default();
        let diffs = vec![FileDiff {
            old_path: "target/debug/foo".to_string(),
            new_path: "target/debug/foo".to_string(),
            unified_diff: String::new(),
            kind: ChangeKind::Modified,
            is_binary: false,
        }];
        let head = snapshot(vec![]);
        let (kept, filtered) = filter_files(&diffs, &head, &cfg);
        assert!(kept.is_empty());
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn filter_files_allows_known_config_files_without_extension_match() {
        let cfg = ReviewFilterConfig::default();
        let diffs = vec![FileDiff {
            old_path: "Cargo.toml".to_string(),
            new_path: "Cargo.toml".to_string(),
            unified_diff: String::new(),
            kind: ChangeKind::Modified,
            is_binary: false,
        }];
        let head = snapshot(vec![("Cargo.toml", "[package]\nname = \"x\"\n")]);
        let (kept, filtered) = filter_files(&diffs, &head, &cfg);
        assert_eq!(kept.len(), 1);
        assert!(filtered.is_empty());
    }

    #[test]
    fn extract_all_symbols_finds_rust_functions() {
        let cache = TreeCache::new();
        let content = "fn foo() {}\nfn bar() {}\n";
        let symbols = extract_all_symbols(&cache, "src/lib.rs", content).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "foo");
    }

    #[test]
    fn build_modified_only_keeps_symbols_touched_by_an_added_line() {
        // A diff that only adds lines inside `bar` must not surface `foo`
        // as an affected symbol.
        let cache = TreeCache::new();
        let content = "fn foo() {\n    1;\n}\n\nfn bar() {\n    1;\n    2;\n}\n";
        let diff = FileDiff {
            old_path: "src/lib.rs".to_string(),
            new_path: "src/lib.rs".to_string(),
            unified_diff: "@@ -5,3 +5,4 @@\n fn bar() {\n+    1;\n     2;\n }\n".to_string(),
            kind: ChangeKind::Modified,
            is_binary: false,
        };
        let head = snapshot(vec![("src/lib.rs", content)]);
        let base = snapshot(vec![("src/lib.rs", content)]);
        let ctx = build_modified(&cache, &diff, &base, &head).unwrap();
        assert_eq!(ctx.symbols.len(), 1);
        assert_eq!(ctx.symbols[0].name, "bar");
    }

    #[test]
    fn build_added_returns_empty_context_when_head_missing_file() {
        let cache = TreeCache::new();
        let diff = FileDiff {
            old_path: String::new(),
            new_path: "src/new.rs".to_string(),
            unified_diff: String::new(),
            kind: ChangeKind::New,
            is_binary: false,
        };
        let head = snapshot(vec![]);
        let ctx = build_added(&cache, &diff, &head).unwrap();
        assert!(ctx.symbols.is_empty());
    }
}
