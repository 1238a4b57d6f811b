//! Bitbucket Cloud provider (REST v2.0) for PR metadata/commits/diffs.
//!
//! Endpoints used:
//! - GET /2.0/repositories/{workspace}/{repo_slug}/pullrequests/{id}
//! - GET /2.0/repositories/{workspace}/{repo_slug}/pullrequests/{id}/commits
//! - GET /2.0/repositories/{workspace}/{repo_slug}/pullrequests/{id}/diff  (raw unified text)
//! - GET /2.0/repositories/{workspace}/{repo_slug}/src/{commit}/{path}
//! - POST /2.0/repositories/{workspace}/{repo_slug}/pullrequests/{id}/comments
//! - PUT /2.0/repositories/{workspace}/{repo_slug}/pullrequests/{id}

use crate::errors::{MrResult, ProviderError};
use crate::git_providers::ProviderKind;
use crate::git_providers::types::*;
use crate::parser::{looks_like_binary_patch, parse_unified_diff_advanced};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct BitbucketClient {
    http: Client,
    base_api: String, // "https://api.bitbucket.org/2.0"
    token: String,    // app password / access token, sent as "Bearer <token>"
}

impl BitbucketClient {
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api,
            token,
        }
    }

    /// Splits `"workspace/repo_slug"` into its two path segments.
    fn workspace_repo(project: &str) -> MrResult<(&str, &str)> {
        project
            .split_once('/')
            .ok_or_else(|| ProviderError::InvalidResponse(format!("not workspace/repo_slug: {project}")).into())
    }

    pub async fn get_meta(&self, id: &ChangeRequestId) -> MrResult<ChangeRequest> {
        let (workspace, repo) = Self::workspace_repo(&id.project)?;
        let url = format!(
            "{}/repositories/{workspace}/{repo}/pullrequests/{}",
            self.base_api, id.iid
        );
        let resp: BbPull = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let diff_refs = DiffRefs {
            base_sha: resp.destination.commit.hash,
            start_sha: None,
            head_sha: resp.source.commit.hash,
        };

        let author = AuthorInfo {
            id: resp.author.uuid,
            username: resp.author.nickname,
            name: Some(resp.author.display_name),
            web_url: resp.author.links.and_then(|l| l.html).map(|h| h.href),
            avatar_url: None,
        };

        Ok(ChangeRequest {
            provider: ProviderKind::Bitbucket,
            id: id.clone(),
            title: resp.title,
            description: Some(resp.description),
            author,
            state: resp.state,
            web_url: resp.links.html.href,
            created_at: resp.created_on,
            updated_at: resp.updated_on,
            source_branch: Some(resp.source.branch.name),
            target_branch: Some(resp.destination.branch.name),
            diff_refs,
        })
    }

    pub async fn get_commits(&self, id: &ChangeRequestId) -> MrResult<Vec<CrCommit>> {
        let (workspace, repo) = Self::workspace_repo(&id.project)?;
        let mut url = format!(
            "{}/repositories/{workspace}/{repo}/pullrequests/{}/commits",
            self.base_api, id.iid
        );
        let mut commits = Vec::new();
        loop {
            let page: BbPage<BbCommit> = self
                .http
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            commits.extend(page.values.into_iter().map(|c| CrCommit {
                id: c.hash,
                title: c.message.lines().next().unwrap_or_default().to_string(),
                message: Some(c.message),
                author_name: Some(c.author.raw),
                authored_at: Some(c.date),
                web_url: c.links.html.map(|h| h.href),
            }));

            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }
        Ok(commits)
    }

    /// Bitbucket has no per-file patch field; the single `/diff` endpoint
    /// returns one unified-diff blob covering every changed file, which we
    /// split on `diff --git` boundaries.
    pub async fn get_changeset(&self, id: &ChangeRequestId) -> MrResult<ChangeSet> {
        let (workspace, repo) = Self::workspace_repo(&id.project)?;
        let url = format!(
            "{}/repositories/{workspace}/{repo}/pullrequests/{}/diff",
            self.base_api, id.iid
        );
        let raw = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(ChangeSet {
            files: split_unified_diff(&raw),
            is_truncated: false,
        })
    }

    /// The `/diff` endpoint already returns the complete unified diff; there
    /// is no larger "raw" variant to fall back to.
    pub async fn try_enrich_changeset(&self, _id: &ChangeRequestId) -> MrResult<Option<ChangeSet>> {
        Ok(None)
    }

    pub async fn get_file_raw(
        &self,
        id: &ChangeRequestId,
        repo_relative_path: &str,
        git_ref: &str,
    ) -> MrResult<Option<Vec<u8>>> {
        let (workspace, repo) = Self::workspace_repo(&id.project)?;
        let url = format!(
            "{}/repositories/{workspace}/{repo}/src/{}/{}",
            self.base_api,
            urlencoding::encode(git_ref),
            repo_relative_path,
        );
        let resp = self.http.get(url).bearer_auth(&self.token).send().await?;

        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let bytes = resp.error_for_status()?.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }

    /// Bitbucket has no recursive-tree endpoint, so the directory listing
    /// under `/src/{commit}/` is walked breadth-first: each `commit_directory`
    /// entry is queued and re-listed until only `commit_file` entries remain.
    async fn get_repository_tree(&self, id: &ChangeRequestId, git_ref: &str) -> MrResult<Vec<String>> {
        let (workspace, repo) = Self::workspace_repo(&id.project)?;
        let mut paths = Vec::new();
        let mut dirs = vec![String::new()];

        while let Some(dir) = dirs.pop() {
            let mut url = format!(
                "{}/repositories/{workspace}/{repo}/src/{}/{}?pagelen=100",
                self.base_api,
                urlencoding::encode(git_ref),
                dir,
            );
            loop {
                let page: BbPage<BbSrcEntry> = self
                    .http
                    .get(&url)
                    .bearer_auth(&self.token)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;

                for entry in page.values {
                    match entry.entry_type.as_str() {
                        "commit_file" => paths.push(entry.path),
                        "commit_directory" => dirs.push(entry.path),
                        _ => {}
                    }
                }

                match page.next {
                    Some(next) => url = next,
                    None => break,
                }
            }
        }

        Ok(paths)
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

    /// Posts one inline PR comment. Bitbucket's `inline.to`/`inline.from`
    /// mirror the added/removed line split: additions set `to`, deletions
    /// set `from`.
    pub async fn create_comment(
        &self,
        id: &ChangeRequestId,
        _diff_refs: &DiffRefs,
        file_path: &str,
        new_line: Option<u32>,
        old_line: Option<u32>,
        body: &str,
    ) -> MrResult<()> {
        let (workspace, repo) = Self::workspace_repo(&id.project)?;
        let url = format!(
            "{}/repositories/{workspace}/{repo}/pullrequests/{}/comments",
            self.base_api, id.iid
        );

        let mut inline = serde_json::json!({ "path": file_path });
        if let Some(l) = new_line {
            inline["to"] = serde_json::json!(l);
        }
        if let Some(l) = old_line {
            inline["from"] = serde_json::json!(l);
        }

        let payload = serde_json::json!({
            "content": { "raw": body },
            "inline": inline,
        });

        self.http
            .post(url)
            .bearer_auth(&self.token)
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
        let (workspace, repo) = Self::workspace_repo(&id.project)?;
        let url = format!(
            "{}/repositories/{workspace}/{repo}/pullrequests/{}",
            self.base_api, id.iid
        );
        self.http
            .put(url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "description": text }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Splits one Bitbucket-style combined unified diff into per-file `FileChange`s.
fn split_unified_diff(raw: &str) -> Vec<FileChange> {
    if !raw.contains("diff --git ") {
        if raw.trim().is_empty() {
            return Vec::new();
        }
        let is_binary = looks_like_binary_patch(raw);
        let hunks = if is_binary {
            Vec::new()
        } else {
            parse_unified_diff_advanced(raw)
        };
        return vec![FileChange {
            old_path: None,
            new_path: None,
            is_new: false,
            is_deleted: false,
            is_renamed: false,
            is_binary,
            hunks,
            raw_unidiff: Some(raw.to_string()),
        }];
    }

    let mut files = Vec::new();
    for part in raw.split("diff --git ").filter(|p| !p.trim().is_empty()) {
        let old_path = part
            .lines()
            .find_map(|l| l.strip_prefix("--- a/").or_else(|| l.strip_prefix("--- ")))
            .map(|s| s.trim_end().to_string())
            .filter(|s| s != "/dev/null");
        let new_path = part
            .lines()
            .find_map(|l| l.strip_prefix("+++ b/").or_else(|| l.strip_prefix("+++ ")))
            .map(|s| s.trim_end().to_string())
            .filter(|s| s != "/dev/null");
        let is_new = old_path.is_none() && new_path.is_some();
        let is_deleted = new_path.is_none() && old_path.is_some();
        let is_binary = looks_like_binary_patch(part);
        let hunks = if is_binary {
            Vec::new()
        } else {
            parse_unified_diff_advanced(part)
        };

        files.push(FileChange {
            old_path: old_path.clone(),
            new_path: new_path.clone(),
            is_new,
            is_deleted,
            is_renamed: false,
            is_binary,
            hunks,
            raw_unidiff: Some(part.to_string()),
        });
    }
    files
}

// --- Bitbucket response shapes (subset of fields we actually use) ---

#[derive(Debug, Deserialize)]
struct BbPage<T> {
    values: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BbPull {
    title: String,
    #[serde(default)]
    description: String,
    state: String,
    created_on: DateTime<Utc>,
    updated_on: DateTime<Utc>,
    links: BbPrLinks,
    author: BbUser,
    source: BbEndpoint,
    destination: BbEndpoint,
}

#[derive(Debug, Deserialize)]
struct BbPrLinks {
    html: BbHref,
}

#[derive(Debug, Deserialize)]
struct BbHref {
    href: String,
}

#[derive(Debug, Deserialize)]
struct BbUser {
    uuid: String,
    #[serde(default)]
    nickname: Option<String>,
    display_name: String,
    #[serde(default)]
    links: Option<BbUserLinks>,
}

#[derive(Debug, Deserialize)]
struct BbUserLinks {
    #[serde(default)]
    html: Option<BbHref>,
}

#[derive(Debug, Deserialize)]
struct BbEndpoint {
    branch: BbBranch,
    commit: BbCommitRef,
}

#[derive(Debug, Deserialize)]
struct BbBranch {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BbCommitRef {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct BbCommit {
    hash: String,
    message: String,
    date: DateTime<Utc>,
    author: BbCommitAuthor,
    #[serde(default)]
    links: BbCommitLinks,
}

#[derive(Debug, Deserialize, Default)]
struct BbCommitLinks {
    html: Option<BbHref>,
}

#[derive(Debug, Deserialize)]
struct BbCommitAuthor {
    raw: String,
}

#[derive(Debug, Deserialize)]
struct BbSrcEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
}
