//! CLI entry point: resolves one `ReviewRequest` from the command line (or
//! its environment-variable fallbacks, via `clap`'s `env` feature), builds
//! the provider client and language model, and runs the review pipeline
//! once to completion.
//!
//! The `api` crate (HTTP/webhook surface) is out of scope for this backend;
//! that's the seam a caller wires up around `mr_reviewer::run_pipeline`.

use std::error::Error;
use std::sync::Arc;

use clap::Parser;

use ai_llm_service::config::default_config::{
    config_ollama_embedding, config_ollama_fast, config_ollama_slow,
};
use ai_llm_service::service_profiles::LlmServiceProfiles;
use mr_reviewer::config::ReviewFilterConfig;
use mr_reviewer::git_providers::{ProviderClient, ProviderConfig, ProviderKind};
use mr_reviewer::llm_bridge::LanguageModel;
use mr_reviewer::model::ReviewRequest;
use mr_reviewer::orchestrator::{CancellationToken, PipelineTimeouts};

/// One review run: which merge/pull request to review and against which
/// provider.
#[derive(Debug, Parser)]
#[command(name = "mr-ai-backend", about = "Runs one automated code review")]
struct Cli {
    /// Provider project identifier (GitLab numeric ID or "group/project").
    #[arg(long, env = "REVIEW_PROJECT_ID")]
    project_id: String,

    /// Merge/pull request IID.
    #[arg(long, env = "REVIEW_MR_IID")]
    merge_request_iid: u64,

    /// Head commit SHA (informational; the pipeline re-resolves this from
    /// provider metadata, but a caller that already has it can pass it
    /// through for logging).
    #[arg(long, env = "REVIEW_HEAD_SHA", default_value = "")]
    head_commit_id: String,

    /// Base commit SHA, see `head_commit_id`.
    #[arg(long, env = "REVIEW_BASE_SHA", default_value = "")]
    base_commit_id: String,

    /// Provider kind: gitlab, github, or bitbucket.
    #[arg(long, env = "REVIEW_PROVIDER", default_value = "gitlab")]
    provider: String,

    /// Provider REST API base URL.
    #[arg(long, env = "REVIEW_PROVIDER_BASE_API")]
    provider_base_api: String,

    /// Provider access token.
    #[arg(long, env = "REVIEW_PROVIDER_TOKEN")]
    provider_token: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let provider_kind = match cli.provider.to_ascii_lowercase().as_str() {
        "gitlab" => ProviderKind::GitLab,
        "github" => ProviderKind::GitHub,
        "bitbucket" => ProviderKind::Bitbucket,
        other => {
            tracing::error!(provider = other, "unknown provider, defaulting to gitlab");
            ProviderKind::GitLab
        }
    };

    let provider = ProviderClient::from_config(ProviderConfig {
        kind: provider_kind,
        base_api: cli.provider_base_api,
        token: cli.provider_token,
    })?;

    let llm = LlmServiceProfiles::new(
        config_ollama_fast()?,
        config_ollama_slow().ok(),
        config_ollama_embedding()?,
        Some(10),
    )?;

    let request = ReviewRequest {
        project_id: cli.project_id,
        merge_request_iid: cli.merge_request_iid,
        head_commit_id: cli.head_commit_id,
        base_commit_id: cli.base_commit_id,
    };

    let outcome = mr_reviewer::run_pipeline(
        Arc::new(provider),
        Arc::new(LanguageModel::new(Arc::new(llm))),
        ReviewFilterConfig::load_from_env_or_default()?,
        request,
        PipelineTimeouts::default(),
        CancellationToken::new(),
    )
    .await?;

    tracing::info!(
        placed = outcome.placed.len(),
        dropped = outcome.dropped.len(),
        filtered_files = outcome.filtered_files,
        comments_posted = outcome.comments_posted,
        "review pipeline finished"
    );

    Ok(())
}
