//! GitHub provider (REST v3) for PR metadata/commits/diffs.
//!
//! Endpoints used:
//! - GET /repos/{owner}/{repo}/pulls/{number}
//! - GET /repos/{owner}/{repo}/pulls/{number}/commits
//! - GET /repos/{owner}/{repo}/pulls/{number}/files  (field "patch" is a per-file unified diff)
//! - GET /repos/{owner}/{repo}/git/trees/{sha}?recursive=1
//! - GET /repos/{owner}/{repo}/contents/{path}?ref={git_ref}  (raw media type)
//! - POST /repos/{owner}/{repo}/pulls/{number}/comments
//! - PATCH /repos/{owner}/{repo}/pulls/{number}

use crate::errors::{MrResult, ProviderError};
use crate::git_providers::ProviderKind;
use crate::git_providers::types::*;
use crate::parser::{looks_like_binary_patch, parse_unified_diff_advanced};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_api: String, // "https://api.github.com"
    token: String,    // PAT, sent as "Bearer <token>"
}

impl GitHubClient {
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api,
            token,
        }
    }

    /// Splits `"owner/repo"` into its two path segments.
    fn owner_repo(project: &str) -> MrResult<(&str, &str)> {
        project
            .split_once('/')
            .ok_or_else(|| ProviderError::InvalidResponse(format!("not owner/repo: {project}")).into())
    }

    pub async fn get_meta(&self, id: &ChangeRequestId) -> MrResult<ChangeRequest> {
        let (owner, repo) = Self::owner_repo(&id.project)?;
        let url = format!("{}/repos/{owner}/{repo}/pulls/{}", self.base_api, id.iid);
        let resp: GhPull = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "mr-reviewer")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let diff_refs = DiffRefs {
            base_sha: resp.base.sha,
            start_sha: None,
            head_sha: resp.head.sha,
        };

        let author = AuthorInfo {
            id: resp.user.id.to_string(),
            username: Some(resp.user.login),
            name: None,
            web_url: resp.user.html_url,
            avatar_url: resp.user.avatar_url,
        };

        Ok(ChangeRequest {
            provider: ProviderKind::GitHub,
            id: id.clone(),
            title: resp.title,
            description: resp.body,
            author,
            state: resp.state,
            web_url: resp.html_url,
            created_at: resp.created_at,
            updated_at: resp.updated_at,
            source_branch: Some(resp.head.ref_name),
            target_branch: Some(resp.base.ref_name),
            diff_refs,
        })
    }

    pub async fn get_commits(&self, id: &ChangeRequestId) -> MrResult<Vec<CrCommit>> {
        let (owner, repo) = Self::owner_repo(&id.project)?;
        let url = format!(
            "{}/repos/{owner}/{repo}/pulls/{}/commits",
            self.base_api, id.iid
        );
        let raw: Vec<GhCommit> = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "mr-reviewer")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(raw
            .into_iter()
            .map(|c| CrCommit {
                id: c.sha,
                title: c.commit.message.lines().next().unwrap_or_default().to_string(),
                message: Some(c.commit.message),
                author_name: c.commit.author.as_ref().map(|a| a.name.clone()),
                authored_at: c.commit.author.and_then(|a| a.date),
                web_url: Some(c.html_url),
            })
            .collect())
    }

    /// Fetches per-file patches. GitHub's `/files` endpoint has no hunk
    /// headers for old/new path of renames beyond `previous_filename`, and
    /// omits `patch` for binary files or files above its diff-size cap.
    pub async fn get_changeset(&self, id: &ChangeRequestId) -> MrResult<ChangeSet> {
        let (owner, repo) = Self::owner_repo(&id.project)?;
        const PER_PAGE: u32 = 100;
        let mut files = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "{}/repos/{owner}/{repo}/pulls/{}/files?per_page={PER_PAGE}&page={page}",
                self.base_api, id.iid
            );
            let batch: Vec<GhFile> = self
                .http
                .get(url)
                .bearer_auth(&self.token)
                .header("Accept", "application/vnd.github+json")
                .header("User-Agent", "mr-reviewer")
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let count = batch.len();
            for f in batch {
                let is_binary = f.patch.is_none();
                let hunks = match &f.patch {
                    Some(p) if !looks_like_binary_patch(p) => parse_unified_diff_advanced(p),
                    _ => Vec::new(),
                };

                files.push(FileChange {
                    old_path: f.previous_filename.clone().or(Some(f.filename.clone())),
                    new_path: Some(f.filename.clone()),
                    is_new: f.status == "added",
                    is_deleted: f.status == "removed",
                    is_renamed: f.status == "renamed",
                    is_binary,
                    hunks,
                    raw_unidiff: f.patch,
                });
            }
            if count < PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        Ok(ChangeSet {
            files,
            is_truncated: false,
        })
    }

    /// GitHub's `/files` payload already carries the full per-file patch;
    /// there is no separate raw-diff endpoint to fall back to.
    pub async fn try_enrich_changeset(&self, _id: &ChangeRequestId) -> MrResult<Option<ChangeSet>> {
        Ok(None)
    }

    pub async fn get_file_raw(
        &self,
        id: &ChangeRequestId,
        repo_relative_path: &str,
        git_ref: &str,
    ) -> MrResult<Option<Vec<u8>>> {
        let (owner, repo) = Self::owner_repo(&id.project)?;
        let url = format!(
            "{}/repos/{owner}/{repo}/contents/{}?ref={}",
            self.base_api,
            urlencoding::encode(repo_relative_path),
            urlencoding::encode(git_ref),
        );
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.raw")
            .header("User-Agent", "mr-reviewer")
            .send()
            .await?;

        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let bytes = resp.error_for_status()?.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }

    /// Lists every blob path in the repository at `git_ref` via the
    /// recursive git-tree endpoint, then fetches each blob's raw content.
    async fn get_repository_tree(&self, id: &ChangeRequestId, git_ref: &str) -> MrResult<Vec<String>> {
        let (owner, repo) = Self::owner_repo(&id.project)?;
        let url = format!(
            "{}/repos/{owner}/{repo}/git/trees/{}?recursive=1",
            self.base_api,
            urlencoding::encode(git_ref),
        );
        let resp: GhTree = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "mr-reviewer")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp
            .tree
            .into_iter()
            .filter(|e| e.entry_type == "blob")
            .map(|e| e.path)
            .collect())
    }

    pub async fn get_repository_snapshot(
        &self,
        id: &ChangeRequestId,
        git_ref: &str,
    ) -> MrResult<crate::model::RepositorySnapshot> {
        let paths = self.get_repository_tree(id, git_ref).await?;
        let mut files = Vec::with_capacity(paths.len());

        for path in paths {
            let Some(bytes) = self.get_file_raw(id, &path, git_ref).await? else {
                continue;
            };
            let sniff_len = bytes.len().min(4096);
            let is_binary = bytes[..sniff_len].contains(&0);
            let content = if is_binary {
                String::new()
            } else {
                String::from_utf8_lossy(&bytes).into_owned()
            };
            files.push(crate::model::RepositoryFile {
                path,
                content,
                is_binary,
                mode: "100644".to_string(),
            });
        }

        Ok(crate::model::RepositorySnapshot {
            commit_id: git_ref.to_string(),
            files,
        })
    }

    /// Posts one review comment via the pulls-comments API. GitHub
    /// addresses comments by `line` on a `side` ("RIGHT" for additions,
    /// "LEFT" for deletions) rather than a single combined position.
    pub async fn create_comment(
        &self,
        id: &ChangeRequestId,
        diff_refs: &DiffRefs,
        file_path: &str,
        new_line: Option<u32>,
        old_line: Option<u32>,
        body: &str,
    ) -> MrResult<()> {
        let (owner, repo) = Self::owner_repo(&id.project)?;
        let url = format!(
            "{}/repos/{owner}/{repo}/pulls/{}/comments",
            self.base_api, id.iid
        );

        let (line, side) = match new_line {
            Some(l) => (l, "RIGHT"),
            None => (old_line.unwrap_or_default(), "LEFT"),
        };

        let payload = serde_json::json!({
            "body": body,
            "commit_id": diff_refs.head_sha,
            "path": file_path,
            "line": line,
            "side": side,
        });

        self.http
            .post(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "mr-reviewer")
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    pub async fn update_merge_request_description(
        &self,
        id: &ChangeRequestId,
        text: &str,
    ) -> MrResult<()> {
        let (owner, repo) = Self::owner_repo(&id.project)?;
        let url = format!("{}/repos/{owner}/{repo}/pulls/{}", self.base_api, id.iid);
        self.http
            .patch(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "mr-reviewer")
            .json(&serde_json::json!({ "body": text }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

// --- GitHub response shapes (subset of fields we actually use) ---

#[derive(Debug, Deserialize)]
struct GhPull {
    title: String,
    body: Option<String>,
    html_url: String,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    user: GhUser,
    head: GhRef,
    base: GhRef,
}

#[derive(Debug, Deserialize)]
struct GhRef {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GhUser {
    id: u64,
    login: String,
    html_url: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhCommit {
    sha: String,
    html_url: String,
    commit: GhCommitDetail,
}

#[derive(Debug, Deserialize)]
struct GhCommitDetail {
    message: String,
    author: Option<GhCommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct GhCommitAuthor {
    name: String,
    #[serde(default)]
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GhFile {
    filename: String,
    #[serde(default)]
    previous_filename: Option<String>,
    status: String,
    #[serde(default)]
    patch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhTree {
    tree: Vec<GhTreeEntry>,
}

#[derive(Debug, Deserialize)]
struct GhTreeEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
}
