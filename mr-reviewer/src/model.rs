//! Core review-pipeline data model.
//!
//! These are the provider-agnostic shapes the Context Assembler, Resolver,
//! and Finding Mapper pass between themselves. `git_providers::types` holds
//! the wire-level shapes a `CodeProvider` actually returns; the orchestrator
//! is the seam that turns those into the types here.

use serde::{Deserialize, Serialize};

/// A single review invocation. Immutable for its whole lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub project_id: String,
    pub merge_request_iid: u64,
    pub head_commit_id: String,
    pub base_commit_id: String,
}

/// Change kind of a single file inside a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    New,
    Deleted,
    Renamed,
    Modified,
}

/// One file's unified diff plus its classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDiff {
    pub old_path: String,
    pub new_path: String,
    pub unified_diff: String,
    pub kind: ChangeKind,
    pub is_binary: bool,
}

/// Coarse role of a single line inside a unified diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffLineKind {
    /// A `@@ ... @@` hunk header. Carries no line numbers.
    Header,
    Context,
    Added,
    Removed,
}

/// One line of a parsed unified diff. `added` carries only `new_line`;
/// `removed` only `old_line`; `context` carries both; `header` carries
/// neither. `position` is the 1-based ordinal among content lines in the
/// diff text (the provider's comment-placement coordinate); `None` for
/// `header` lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub content: String,
    pub old_line: Option<u32>,
    pub new_line: Option<u32>,
    pub position: Option<u32>,
}

impl FileDiff {
    /// The path this diff should be filed/addressed under: `new_path` unless
    /// the file was deleted, in which case only `old_path` still exists.
    pub fn canonical_path(&self) -> &str {
        if self.kind == ChangeKind::Deleted {
            &self.old_path
        } else {
            &self.new_path
        }
    }
}

/// The full file tree at one commit. Read-only once built.
#[derive(Debug, Clone)]
pub struct RepositorySnapshot {
    pub commit_id: String,
    pub files: Vec<RepositoryFile>,
}

impl RepositorySnapshot {
    pub fn file(&self, path: &str) -> Option<&RepositoryFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Files other than `path`, in the same directory as `path`.
    pub fn siblings_of<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a RepositoryFile> {
        let dir = parent_dir(path);
        self.files
            .iter()
            .filter(move |f| f.path != path && parent_dir(&f.path) == dir)
    }
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// One file's content at one commit.
#[derive(Debug, Clone)]
pub struct RepositoryFile {
    pub path: String,
    pub content: String,
    pub is_binary: bool,
    pub mode: String,
}

/// Coarse classification of a named construct in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Struct,
    Interface,
    Enum,
    Type,
    Variable,
    Constant,
    Package,
    Import,
    FunctionCall,
    Unknown,
}

/// A named, line-bounded construct in source, plus its resolved graph edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    pub body: String,
    pub doc_comment: String,
    pub signature: String,
    pub package: String,
    pub dependencies: Vec<Dependency>,
    pub callers: Vec<Caller>,
}

impl Symbol {
    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

/// An outbound reference from inside a symbol's body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub line: usize,
    pub kind: SymbolKind,
    /// Empty string means unresolved / external.
    pub source_file: String,
    pub source_code: Option<String>,
    pub doc: Option<String>,
}

impl Dependency {
    pub fn is_external(&self) -> bool {
        self.source_file.is_empty()
    }
}

/// An inbound reference to a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caller {
    pub file_path: String,
    pub line: usize,
    /// Name of the enclosing function/method, or `"global"` at top level.
    pub containing_function: String,
    pub snippet: String,
}

/// Per-file context entry inside a `ContextBundle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContext {
    pub file_path: String,
    pub change_kind: ChangeKind,
    pub symbols: Vec<Symbol>,
}

impl FileContext {
    pub fn stub(file_path: String, change_kind: ChangeKind) -> Self {
        Self {
            file_path,
            change_kind,
            symbols: Vec::new(),
        }
    }
}

/// A file excluded from analysis, with the reason recorded for the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteredFile {
    pub file_path: String,
    pub reason: String,
}

/// Aggregate counters attached to a `ContextBundle` for the summary line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleStats {
    pub files_total: usize,
    pub files_analysed: usize,
    pub files_filtered: usize,
    pub symbols_total: usize,
}

/// Everything the `LanguageModel` needs to analyse one merge request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    pub project_id: String,
    pub merge_request_iid: u64,
    pub title: String,
    pub description: Option<String>,
    pub files: Vec<FileContext>,
    pub stats: BundleStats,
    pub filtered: Vec<FilteredFile>,
}

/// One issue produced by the language model, before placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: Option<usize>,
    pub issue_kind: String,
    pub impact: String,
    pub priority: String,
    pub confidence: f32,
    pub title: String,
    pub description: String,
    pub suggestion: Option<String>,
    pub code_snippet: Option<String>,
}

/// A `Finding` enriched with placement coordinates by the Finding Mapper,
/// ready for `CodeProvider::create_comment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedFinding {
    pub finding: Finding,
    /// 1-based ordinal in the diff text; the provider's comment coordinate.
    pub position: u32,
    pub old_line: Option<u32>,
    pub language_tag: String,
}

/// Why a finding never became a `PlacedFinding`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroppedFinding {
    pub file_path: String,
    pub start_line: usize,
    pub reason: String,
}
