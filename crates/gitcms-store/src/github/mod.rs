//! GitHub-backed snapshot repository
//!
//! Talks to the REST git-data API of one repository and branch. Collection
//! files are read through the contents endpoint pinned to the commit of the
//! attempt; writes go blob, tree (on top of the head tree), commit, then a
//! non-forced ref update.

mod wire;

use crate::errors::RemoteError;
use crate::repository::{
    AdvanceOutcome, BlobHandle, CommitHandle, Head, SnapshotRepository, TreeEntry, TreeHandle,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gitcms_core::canonical::parse_content;
use gitcms_core::errors::{CmsError, ErrorKind};
use gitcms_core::{CollectionKind, CollectionSnapshot, Result, VersionToken};
use gitcms_core_types::Sensitive;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use wire::{
    CommitResponse, ContentResponse, CreateBlobRequest, CreateCommitRequest, CreateTreeRequest,
    CreatedResponse, RefResponse, TreeItem, UpdateRefRequest,
};

const DEFAULT_API: &str = "https://api.github.com";
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const API_VERSION: &str = "2022-11-28";
const FILE_MODE: &str = "100644";

/// GitHub repository configuration
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API root, without trailing slash
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub token: Sensitive<String>,
    pub timeout: Duration,
    pub user_agent: String,
}

impl GitHubConfig {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            api_base: DEFAULT_API.to_string(),
            owner: owner.into(),
            repo: repo.into(),
            branch: DEFAULT_BRANCH.to_string(),
            token: Sensitive::new(token.into()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: concat!("gitcms/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Create config from environment variables.
    ///
    /// - `GITCMS_GITHUB_OWNER`, `GITCMS_GITHUB_REPO`, `GITCMS_GITHUB_TOKEN`: required
    /// - `GITCMS_GITHUB_API`: optional API root (default: https://api.github.com)
    /// - `GITCMS_GITHUB_BRANCH`: optional branch (default: main)
    /// - `GITCMS_HTTP_TIMEOUT_SECS`: optional timeout in seconds (default: 30)
    ///
    /// # Errors
    ///
    /// `Config` if a required variable is missing or empty, or if the
    /// timeout is set but not a whole number of seconds.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required =
            |name: &str| var(name).ok_or_else(|| config_error(format!("{} not set", name)));

        let mut config = Self::new(
            required("GITCMS_GITHUB_OWNER")?,
            required("GITCMS_GITHUB_REPO")?,
            required("GITCMS_GITHUB_TOKEN")?,
        );

        if let Some(api) = var("GITCMS_GITHUB_API") {
            config = config.with_api_base(api);
        }
        if let Some(branch) = var("GITCMS_GITHUB_BRANCH") {
            config = config.with_branch(branch);
        }
        if let Some(raw) = var("GITCMS_HTTP_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                config_error(format!(
                    "GITCMS_HTTP_TIMEOUT_SECS has an invalid value '{}'",
                    raw
                ))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn config_error(message: String) -> CmsError {
    CmsError::new(ErrorKind::Config)
        .with_op("github_config")
        .with_message(message)
}

/// Snapshot repository over the GitHub REST API
pub struct GitHubRepository {
    client: Client,
    config: GitHubConfig,
}

impl GitHubRepository {
    /// # Errors
    ///
    /// `Config` if owner, repo or token is empty or the HTTP client cannot
    /// be built.
    pub fn new(config: GitHubConfig) -> Result<Self> {
        if config.owner.is_empty() || config.repo.is_empty() || config.token.expose().is_empty() {
            return Err(CmsError::new(ErrorKind::Config)
                .with_op("github_repository")
                .with_message("GitHub owner, repo and token must all be set"));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                CmsError::new(ErrorKind::Config)
                    .with_op("github_repository")
                    .with_message(e.to_string())
            })?;

        Ok(Self { client, config })
    }

    /// # Errors
    ///
    /// See [`GitHubConfig::from_env`] and [`GitHubRepository::new`].
    pub fn from_env() -> Result<Self> {
        Self::new(GitHubConfig::from_env()?)
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    fn url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.config.api_base, self.config.owner, self.config.repo, suffix
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(self.config.token.expose())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Send `request`, mapping non-success statuses to `RemoteError`
    async fn send(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> std::result::Result<reqwest::Response, RemoteError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(what.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        op: &str,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let response = self
            .send(request, what)
            .await
            .map_err(|e| e.into_cms(op))?;
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()).into_cms(op))
    }

    async fn branch_commit(&self) -> Result<CommitHandle> {
        let reference: RefResponse = self
            .send_json(
                "head",
                self.client
                    .get(self.url(&format!("git/ref/heads/{}", self.config.branch))),
                &format!("branch {}", self.config.branch),
            )
            .await?;
        Ok(CommitHandle::new(reference.object.sha))
    }

    /// Decode a base64 content body, fetching the raw blob when the
    /// contents endpoint omitted it (files over 1 MB)
    async fn file_bytes(&self, file: ContentResponse, path: &str) -> Result<Vec<u8>> {
        let file = if file.encoding == "none" {
            self.send_json::<ContentResponse>(
                "fetch_snapshot",
                self.client.get(self.url(&format!("git/blobs/{}", file.sha))),
                path,
            )
            .await?
        } else {
            file
        };

        let packed: String = file.content.split_whitespace().collect();
        STANDARD.decode(packed).map_err(|e| {
            RemoteError::Decode(format!("{}: {}", path, e)).into_cms("fetch_snapshot")
        })
    }
}

#[async_trait]
impl SnapshotRepository for GitHubRepository {
    async fn head(&self) -> Result<Head> {
        let commit = self.branch_commit().await?;
        let details: CommitResponse = self
            .send_json(
                "head",
                self.client
                    .get(self.url(&format!("git/commits/{}", commit))),
                commit.as_str(),
            )
            .await?;

        Ok(Head {
            commit: CommitHandle::new(details.sha),
            tree: TreeHandle::new(details.tree.sha),
        })
    }

    async fn fetch_snapshot(
        &self,
        collection: CollectionKind,
        at: &Head,
    ) -> Result<CollectionSnapshot> {
        let path = collection.path();
        let file: ContentResponse = self
            .send_json(
                "fetch_snapshot",
                self.client
                    .get(self.url(&format!("contents/{}", path)))
                    .query(&[("ref", at.commit.as_str())]),
                path,
            )
            .await
            .map_err(|e| e.with_collection(collection))?;

        let version = VersionToken::new(file.sha.clone());
        let bytes = self.file_bytes(file, path).await?;
        let content = parse_content(collection, &bytes)?;

        tracing::debug!(collection = %collection, version = version.as_str(), "Fetched snapshot");
        Ok(CollectionSnapshot::new(collection, version, content))
    }

    async fn create_blob(&self, bytes: &[u8]) -> Result<BlobHandle> {
        let created: CreatedResponse = self
            .send_json(
                "create_blob",
                self.client.post(self.url("git/blobs")).json(&CreateBlobRequest {
                    content: STANDARD.encode(bytes),
                    encoding: "base64",
                }),
                "blob",
            )
            .await?;
        Ok(BlobHandle::new(created.sha))
    }

    async fn create_tree(&self, base: &TreeHandle, entries: &[TreeEntry]) -> Result<TreeHandle> {
        let body = CreateTreeRequest {
            base_tree: base.as_str(),
            tree: entries
                .iter()
                .map(|entry| TreeItem {
                    path: &entry.path,
                    mode: FILE_MODE,
                    kind: "blob",
                    sha: entry.blob.as_str(),
                })
                .collect(),
        };
        let created: CreatedResponse = self
            .send_json(
                "create_tree",
                self.client.post(self.url("git/trees")).json(&body),
                base.as_str(),
            )
            .await?;
        Ok(TreeHandle::new(created.sha))
    }

    async fn create_commit(
        &self,
        tree: &TreeHandle,
        parent: &CommitHandle,
        message: &str,
    ) -> Result<CommitHandle> {
        let body = CreateCommitRequest {
            message,
            tree: tree.as_str(),
            parents: [parent.as_str()],
        };
        let created: CreatedResponse = self
            .send_json(
                "create_commit",
                self.client.post(self.url("git/commits")).json(&body),
                tree.as_str(),
            )
            .await?;
        Ok(CommitHandle::new(created.sha))
    }

    async fn advance_branch(
        &self,
        expected: &CommitHandle,
        new: &CommitHandle,
    ) -> Result<AdvanceOutcome> {
        // A non-forced update only rejects non-fast-forwards, so check the
        // pointer first to reject a branch reset to an ancestor too.
        let current = self.branch_commit().await?;
        if current != *expected {
            tracing::debug!(expected = %expected, actual = %current, "Branch moved");
            return Ok(AdvanceOutcome::Conflict);
        }

        let request = self
            .client
            .patch(self.url(&format!("git/refs/heads/{}", self.config.branch)))
            .json(&UpdateRefRequest {
                sha: new.as_str(),
                force: false,
            });

        match self.send(request, &self.config.branch).await {
            Ok(_) => Ok(AdvanceOutcome::Advanced),
            Err(RemoteError::Status { status: 409 | 422, body }) => {
                tracing::debug!(body = %body, "Ref update rejected as non-fast-forward");
                Ok(AdvanceOutcome::Conflict)
            }
            Err(e) => Err(e.into_cms("advance_branch")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn repository() -> GitHubRepository {
        GitHubRepository::new(
            GitHubConfig::new("acme", "site", "tok").with_api_base("http://localhost:9/"),
        )
        .unwrap()
    }

    #[test]
    fn test_url_layout() {
        let repo = repository();
        assert_eq!(
            repo.url("git/blobs"),
            "http://localhost:9/repos/acme/site/git/blobs"
        );
    }

    #[test]
    fn test_empty_token_is_config_error() {
        let err = GitHubRepository::new(GitHubConfig::new("acme", "site", "")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("GITCMS_GITHUB_OWNER", "acme"),
        ("GITCMS_GITHUB_REPO", "site"),
        ("GITCMS_GITHUB_TOKEN", "tok"),
    ];

    #[test]
    fn test_config_defaults() {
        let config = GitHubConfig::from_vars(vars(&REQUIRED)).unwrap();
        assert_eq!(config.api_base, DEFAULT_API);
        assert_eq!(config.branch, "main");
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_config_reads_optional_vars() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("GITCMS_GITHUB_BRANCH", "content"));
        pairs.push(("GITCMS_HTTP_TIMEOUT_SECS", "5"));
        let config = GitHubConfig::from_vars(vars(&pairs)).unwrap();
        assert_eq!(config.branch, "content");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_unparsable_timeout_is_config_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("GITCMS_HTTP_TIMEOUT_SECS", "thirty"));
        let err = GitHubConfig::from_vars(vars(&pairs)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.message().contains("GITCMS_HTTP_TIMEOUT_SECS"));
    }

    #[test]
    fn test_missing_owner_is_config_error() {
        let err = GitHubConfig::from_vars(vars(&REQUIRED[1..])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.message().contains("GITCMS_GITHUB_OWNER"));
    }

    #[test]
    fn test_token_is_redacted_in_debug() {
        let config = GitHubConfig::new("acme", "site", "ghp_secret");
        assert!(!format!("{:?}", config).contains("ghp_secret"));
    }

    #[test]
    fn test_tree_request_shape() {
        let body = CreateTreeRequest {
            base_tree: "base",
            tree: vec![TreeItem {
                path: "data/videos.json",
                mode: FILE_MODE,
                kind: "blob",
                sha: "abc",
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["tree"][0]["type"], "blob");
        assert_eq!(value["tree"][0]["mode"], "100644");
        assert_eq!(value["base_tree"], "base");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_remote_unavailable() {
        let repo = repository();
        let err = repo.head().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
    }
}
