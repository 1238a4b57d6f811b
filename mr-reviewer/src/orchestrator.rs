//! Pipeline Orchestrator.
//!
//! Sequences the whole review: fetch the change request and both repository
//! snapshots, filter and assemble per-file context (bounded fan-out), resolve
//! cross-file symbol edges, hand the bundle to the language model, map its
//! findings back onto diff coordinates, and post the ones that placed.
//!
//! A hand-rolled cooperative `CancellationToken` stands in for
//! `tokio-util::CancellationToken` (not a dependency of this workspace): an
//! `AtomicBool` flag plus a `Notify` so callers can either poll or `.await`
//! cancellation. `PipelineTimeouts` wraps the whole run and each per-file
//! assembly task in `tokio::time::timeout`, mirroring the deadline style
//! `ai-llm-service::health_service` uses for its own health probes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};

use crate::assembler;
use crate::config::ReviewFilterConfig;
use crate::desc_markers::{self, DescriptionSection};
use crate::errors::{Error, MrResult};
use crate::finding_mapper::{self, FileDiffIndex};
use crate::git_providers::ProviderClient;
use crate::git_providers::types::{ChangeRequest, ChangeRequestId, FileChange};
use crate::lang;
use crate::llm_bridge::LanguageModel;
use crate::model::{
    BundleStats, ChangeKind, ContextBundle, DroppedFinding, FileContext, FileDiff, PlacedFinding,
    RepositorySnapshot, ReviewRequest,
};
use crate::resolver::{self, ResolverFile};
use crate::tree::TreeCache;

/// Coarse progress marker a caller can observe or log against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    Fetching,
    Assembling,
    Analysing,
    Posting,
    Done,
    Failed,
}

/// Cooperative cancellation signal shared across the orchestrator's spawned
/// tasks. Checked between stages and before each per-file assembly task;
/// never forcibly aborts a task mid-flight.
#[derive(Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Deadlines for the overall run and for the two stages whose duration
/// scales with repository/diff size. `per_file` bounds a single file's
/// assembly task, not the whole fan-out.
#[derive(Debug, Clone, Copy)]
pub struct PipelineTimeouts {
    pub provider_call: Duration,
    pub per_file: Duration,
    pub overall: Duration,
}

impl Default for PipelineTimeouts {
    fn default() -> Self {
        Self {
            provider_call: Duration::from_secs(30),
            per_file: Duration::from_secs(20),
            overall: Duration::from_secs(300),
        }
    }
}

/// What a run produced, whether or not every finding made it to a comment.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub state: PipelineState,
    pub placed: Vec<PlacedFinding>,
    pub dropped: Vec<DroppedFinding>,
    pub filtered_files: usize,
    pub comments_posted: usize,
}

/// Runs one full review end to end. `provider` and `llm` are shared handles
/// the caller constructs once per process; `cancel` lets an outer webhook
/// handler (out of scope here) abort a long-running review.
pub async fn run_pipeline(
    provider: Arc<ProviderClient>,
    llm: Arc<LanguageModel>,
    cfg: ReviewFilterConfig,
    request: ReviewRequest,
    timeouts: PipelineTimeouts,
    cancel: CancellationToken,
) -> MrResult<PipelineOutcome> {
    match tokio::time::timeout(
        timeouts.overall,
        run_inner(provider, llm, cfg, request, timeouts, cancel),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(Error::Other("pipeline run exceeded its overall timeout".to_string())),
    }
}

async fn run_inner(
    provider: Arc<ProviderClient>,
    llm: Arc<LanguageModel>,
    cfg: ReviewFilterConfig,
    request: ReviewRequest,
    timeouts: PipelineTimeouts,
    cancel: CancellationToken,
) -> MrResult<PipelineOutcome> {
    let id = ChangeRequestId {
        project: request.project_id.clone(),
        iid: request.merge_request_iid,
    };

    tracing::info!(project = %id.project, iid = id.iid, "starting review pipeline");

    let meta = with_provider_timeout(timeouts, provider.fetch_meta(&id)).await?;
    let mut changeset = with_provider_timeout(timeouts, provider.fetch_changes(&id)).await?;
    if changeset.is_truncated {
        if let Some(enriched) = with_provider_timeout(timeouts, provider.try_enrich_changes(&id)).await? {
            changeset = enriched;
        }
    }

    if cancel.is_cancelled() {
        return Ok(cancelled_outcome());
    }

    let diffs: Vec<FileDiff> = changeset.files.iter().map(file_change_to_diff).collect();

    if cfg.enable_description_generation {
        maybe_update_description(&provider, &llm, &id, &meta, &diffs, timeouts).await;
    }

    let head = with_provider_timeout(
        timeouts,
        provider.get_repository_snapshot(&id, &meta.diff_refs.head_sha),
    )
    .await?;

    let base = match with_provider_timeout(
        timeouts,
        provider.get_repository_snapshot(&id, &meta.diff_refs.base_sha),
    )
    .await
    {
        Ok(snapshot) => snapshot,
        Err(e) => {
            // When the base snapshot can't be fetched (new repository,
            // shallow mirror, provider hiccup) fall back to the head
            // snapshot rather than failing the whole review. Dependency
            // resolution against base-only-deleted code degrades silently;
            // everything else still works.
            tracing::warn!(error = %e, "falling back to head snapshot for base (see DESIGN.md)");
            head.clone()
        }
    };

    if cancel.is_cancelled() {
        return Ok(cancelled_outcome());
    }

    let (kept, filtered) = assembler::filter_files(&diffs, &head, &cfg);
    let filtered_count = filtered.len();

    let cache = Arc::new(TreeCache::new());
    let base = Arc::new(base);
    let head = Arc::new(head);
    let semaphore = Arc::new(Semaphore::new(cfg.max_concurrency.max(1)));

    let mut handles = Vec::with_capacity(kept.len());
    for diff in kept.iter().cloned() {
        let cache = Arc::clone(&cache);
        let base = Arc::clone(&base);
        let head = Arc::clone(&head);
        let semaphore = Arc::clone(&semaphore);
        let per_file_timeout = timeouts.per_file;
        let path_for_stub = diff.canonical_path().to_string();
        let kind_for_stub = diff.kind;

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let result = tokio::time::timeout(
                per_file_timeout,
                tokio::task::spawn_blocking(move || assembler::assemble_file(&cache, &diff, &base, &head)),
            )
            .await;

            match result {
                Ok(Ok(Ok(ctx))) => ctx,
                _ => FileContext::stub(path_for_stub, kind_for_stub),
            }
        }));
    }

    let mut file_contexts = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(ctx) => file_contexts.push(ctx),
            Err(_) => continue,
        }
    }

    if cancel.is_cancelled() {
        return Ok(cancelled_outcome());
    }

    let resolved_contexts = resolve_cross_file(&cache, &file_contexts, &base, &head);

    let stats = BundleStats {
        files_total: diffs.len(),
        files_analysed: resolved_contexts.len(),
        files_filtered: filtered_count,
        symbols_total: resolved_contexts.iter().map(|f| f.symbols.len()).sum(),
    };

    let bundle = ContextBundle {
        project_id: request.project_id.clone(),
        merge_request_iid: request.merge_request_iid,
        title: meta.title.clone(),
        description: meta.description.clone(),
        files: resolved_contexts,
        stats,
        filtered,
    };

    tracing::info!(
        files_analysed = bundle.stats.files_analysed,
        files_filtered = bundle.stats.files_filtered,
        symbols_total = bundle.stats.symbols_total,
        "context bundle assembled"
    );

    if cancel.is_cancelled() {
        return Ok(cancelled_outcome());
    }

    let findings = llm.analyse(&bundle).await?;

    let diff_indices: HashMap<String, FileDiffIndex> = kept
        .iter()
        .map(|d| {
            let language_tag = lang::classify(d.canonical_path()).tag().to_string();
            (
                d.canonical_path().to_string(),
                FileDiffIndex::build(&d.unified_diff, &language_tag),
            )
        })
        .collect();

    let (placed, dropped) = finding_mapper::map_findings(findings, &diff_indices);

    if !dropped.is_empty() {
        tracing::info!(dropped = dropped.len(), "some findings could not be placed");
    }

    let mut comments_posted = 0usize;
    for pf in &placed {
        if cancel.is_cancelled() {
            break;
        }
        let (new_line, old_line) = if pf.old_line.is_some() {
            (Some(pf.position), pf.old_line)
        } else {
            (Some(pf.finding.start_line as u32), None)
        };
        let body = render_comment_body(pf);
        match with_provider_timeout(
            timeouts,
            provider.create_comment(&id, &meta.diff_refs, &pf.finding.file_path, new_line, old_line, &body),
        )
        .await
        {
            Ok(()) => comments_posted += 1,
            Err(e) => tracing::warn!(error = %e, file = %pf.finding.file_path, "failed to post comment"),
        }
    }

    Ok(PipelineOutcome {
        state: PipelineState::Done,
        placed,
        dropped,
        filtered_files: filtered_count,
        comments_posted,
    })
}

/// Best-effort: generates the "summary" description section from the
/// merge request's full diff text and merges it into the description via
/// the marker protocol. Feature-flagged by `enable_description_generation`;
/// any failure (LLM unavailable, provider rejects the update) is logged and
/// swallowed, never promoted to a pipeline failure.
async fn maybe_update_description(
    provider: &ProviderClient,
    llm: &LanguageModel,
    id: &ChangeRequestId,
    meta: &ChangeRequest,
    diffs: &[FileDiff],
    timeouts: PipelineTimeouts,
) {
    let full_diff_text = diffs
        .iter()
        .map(|d| format!("--- {}\n+++ {}\n{}", d.old_path, d.new_path, d.unified_diff))
        .collect::<Vec<_>>()
        .join("\n");

    if full_diff_text.trim().is_empty() {
        return;
    }

    let generated = match tokio::time::timeout(timeouts.provider_call, llm.generate_description(&full_diff_text)).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "description generation failed, leaving description untouched");
            return;
        }
        Err(_) => {
            tracing::warn!("description generation timed out, leaving description untouched");
            return;
        }
    };

    let existing = meta.description.clone().unwrap_or_default();
    let merged = desc_markers::apply_section(&existing, DescriptionSection::Summary, generated.trim());

    match tokio::time::timeout(timeouts.provider_call, provider.update_merge_request_description(id, &merged)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "failed to update merge request description"),
        Err(_) => tracing::warn!("updating merge request description timed out"),
    }
}

async fn with_provider_timeout<T>(
    timeouts: PipelineTimeouts,
    fut: impl std::future::Future<Output = MrResult<T>>,
) -> MrResult<T> {
    match tokio::time::timeout(timeouts.provider_call, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Other("provider call timed out".to_string())),
    }
}

fn cancelled_outcome() -> PipelineOutcome {
    PipelineOutcome {
        state: PipelineState::Failed,
        placed: Vec::new(),
        dropped: Vec::new(),
        filtered_files: 0,
        comments_posted: 0,
    }
}

/// Converts a provider-facing `FileChange` into the pipeline's own
/// `FileDiff`, re-deriving the unified diff text from `raw_unidiff` (the
/// provider client always populates this, even for the hunk-based variant
/// used elsewhere in this crate).
fn file_change_to_diff(change: &FileChange) -> FileDiff {
    let kind = if change.is_new {
        ChangeKind::New
    } else if change.is_deleted {
        ChangeKind::Deleted
    } else if change.is_renamed {
        ChangeKind::Renamed
    } else {
        ChangeKind::Modified
    };

    FileDiff {
        old_path: change.old_path.clone().unwrap_or_default(),
        new_path: change.new_path.clone().unwrap_or_default(),
        unified_diff: change.raw_unidiff.clone().unwrap_or_default(),
        kind,
        is_binary: change.is_binary,
    }
}

/// Runs the Cross-file Symbol Resolver over every assembled file, searching
/// the whole repository snapshot for definitions and callers — not just the
/// files that happened to change in this diff.
///
/// `head` is the snapshot searched by default; files deleted by this change
/// (present only in `base`) are added in too, so a dependency or caller that
/// only existed on the base side is still found rather than reported as
/// external/uncalled.
fn resolve_cross_file(
    cache: &TreeCache,
    file_contexts: &[FileContext],
    base: &RepositorySnapshot,
    head: &RepositorySnapshot,
) -> Vec<FileContext> {
    let snapshot = merge_snapshots(base, head);

    file_contexts
        .iter()
        .map(|ctx| {
            let Some(repo_file) = snapshot.file(&ctx.file_path) else {
                return ctx.clone();
            };
            let target = ResolverFile {
                path: &ctx.file_path,
                content: &repo_file.content,
                language: lang::classify(&ctx.file_path),
            };
            let mut resolved = ctx.clone();
            resolved.symbols = resolver::resolve_symbols(cache, &target, &ctx.symbols, &snapshot);
            resolved
        })
        .collect()
}

/// `head`'s files, plus any `base` file whose path no longer exists on
/// `head` (deleted by this change). `head`'s content wins on any path
/// present in both.
fn merge_snapshots(base: &RepositorySnapshot, head: &RepositorySnapshot) -> RepositorySnapshot {
    let mut files = head.files.clone();
    for file in &base.files {
        if head.file(&file.path).is_none() {
            files.push(file.clone());
        }
    }
    RepositorySnapshot {
        commit_id: head.commit_id.clone(),
        files,
    }
}

/// Renders a `PlacedFinding` into the markdown body posted as a review
/// comment.
fn render_comment_body(pf: &PlacedFinding) -> String {
    let mut body = format!(
        "**{}** ({} / {})\n\n{}",
        pf.finding.title, pf.finding.priority, pf.finding.impact, pf.finding.description
    );
    if let Some(suggestion) = &pf.finding.suggestion {
        body.push_str(&format!("\n\n**Suggestion:**\n{suggestion}"));
    }
    if let Some(snippet) = &pf.finding.code_snippet {
        body.push_str(&format!("\n\n```{}\n{}\n```", pf.language_tag, snippet));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_token_reports_cancelled_after_cancel() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn file_change_to_diff_classifies_new_files() {
        let change = FileChange {
            old_path: None,
            new_path: Some("a.rs".to_string()),
            is_new: true,
            is_deleted: false,
            is_renamed: false,
            is_binary: false,
            hunks: Vec::new(),
            raw_unidiff: Some("@@ -0,0 +1 @@\n+fn a() {}\n".to_string()),
        };
        let diff = file_change_to_diff(&change);
        assert_eq!(diff.kind, ChangeKind::New);
        assert_eq!(diff.new_path, "a.rs");
    }
}
