//! Request and response bodies of the GitHub git-data API

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct RefResponse {
    pub object: ShaRef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShaRef {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitResponse {
    pub sha: String,
    pub tree: ShaRef,
}

/// `contents/{path}` and `git/blobs/{sha}` responses
#[derive(Debug, Deserialize)]
pub(crate) struct ContentResponse {
    pub sha: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateBlobRequest {
    pub content: String,
    pub encoding: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateTreeRequest<'a> {
    pub base_tree: &'a str,
    pub tree: Vec<TreeItem<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TreeItem<'a> {
    pub path: &'a str,
    pub mode: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub sha: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateCommitRequest<'a> {
    pub message: &'a str,
    pub tree: &'a str,
    pub parents: [&'a str; 1],
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateRefRequest<'a> {
    pub sha: &'a str,
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedResponse {
    pub sha: String,
}
