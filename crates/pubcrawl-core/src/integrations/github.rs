//! GitHub integration -- keep the ledger tables as files in a repository.
//!
//! Uses the REST contents API: `GET /repos/{owner}/{repo}/contents/{path}`
//! returns base64 content plus the blob sha, and `PUT` to the same URL
//! creates or (given the current sha) replaces the file.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::runtime::Runtime;

use crate::blob::{Blob, BlobStore};
use crate::error::StoreError;
use crate::integrations::keyring_store;
use crate::storage::GitHubStoreConfig;

const USER_AGENT: &str = "pubcrawl";
const ACCEPT: &str = "application/vnd.github+json";

/// Environment variable that overrides the keyring token.
pub const TOKEN_ENV: &str = "PUBCRAWL_GITHUB_TOKEN";
const TOKEN_KEY: &str = "github_token";

/// Where a token was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Environment,
    Keyring,
}

impl TokenSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenSource::Environment => "environment",
            TokenSource::Keyring => "keyring",
        }
    }
}

/// Look up the token: environment first, then the OS keyring.
pub fn resolve_token() -> Option<(String, TokenSource)> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            return Some((token, TokenSource::Environment));
        }
    }
    match keyring_store::get(TOKEN_KEY) {
        Ok(Some(token)) if !token.is_empty() => Some((token, TokenSource::Keyring)),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("keyring lookup failed: {e}");
            None
        }
    }
}

/// Persist a token to the OS keyring.
pub fn save_token(token: &str) -> Result<(), StoreError> {
    keyring_store::set(TOKEN_KEY, token.trim()).map_err(|e| StoreError::Backend(e.to_string()))
}

/// Remove the stored token. Missing entries are not an error.
pub fn forget_token() -> Result<(), StoreError> {
    keyring_store::delete(TOKEN_KEY).map_err(|e| StoreError::Backend(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

/// Blob store over a GitHub repository branch.
///
/// Calls are blocking: the store owns a single-threaded runtime and drives
/// each request to completion on it.
pub struct GitHubBlobStore {
    client: Client,
    runtime: Runtime,
    api_url: String,
    owner: String,
    repo: String,
    branch: String,
    token: Option<String>,
}

impl GitHubBlobStore {
    pub fn new(
        api_url: &str,
        owner: &str,
        repo: &str,
        branch: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        url::Url::parse(api_url)
            .map_err(|e| StoreError::Backend(format!("invalid api_url '{api_url}': {e}")))?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            client,
            runtime,
            api_url: api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
            token,
        })
    }

    /// Build from `[store.github]`, picking up the token from the
    /// environment or the keyring.
    pub fn from_config(config: &GitHubStoreConfig) -> Result<Self, StoreError> {
        let token = resolve_token().map(|(token, source)| {
            tracing::debug!(source = source.as_str(), "using GitHub token");
            token
        });
        Self::new(
            &config.api_url,
            &config.owner,
            &config.repo,
            &config.branch,
            token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Check the token by fetching the authenticated user's login.
    pub fn authenticated_user(&self) -> Result<String, StoreError> {
        if self.token.is_none() {
            return Err(StoreError::Backend("GitHub is not authenticated".into()));
        }
        let request = self.authorize(self.client.get(format!("{}/user", self.api_url)));
        self.runtime.block_on(async {
            let resp = request.send().await?;
            if !resp.status().is_success() {
                return Err(api_error(resp).await);
            }
            let user: UserResponse = resp.json().await?;
            Ok::<_, StoreError>(user.login)
        })
    }

    fn contents_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url,
            urlencoding::encode(&self.owner),
            urlencoding::encode(&self.repo),
            encoded.join("/")
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", ACCEPT);
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    fn put(
        &self,
        path: &str,
        message: &str,
        content: &str,
        sha: Option<&str>,
    ) -> Result<String, StoreError> {
        let mut body = json!({
            "message": message,
            "content": STANDARD.encode(content),
            "branch": self.branch,
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }
        let request = self.authorize(self.client.put(self.contents_url(path)).json(&body));

        self.runtime.block_on(async {
            let resp = request.send().await?;
            match resp.status() {
                StatusCode::OK | StatusCode::CREATED => {
                    let parsed: PutResponse = resp.json().await?;
                    Ok::<_, StoreError>(parsed.content.sha)
                }
                StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                    Err(StoreError::Conflict {
                        path: path.to_string(),
                    })
                }
                _ => Err(api_error(resp).await),
            }
        })
    }
}

impl BlobStore for GitHubBlobStore {
    fn get(&self, path: &str) -> Result<Option<Blob>, StoreError> {
        let request = self.authorize(
            self.client
                .get(self.contents_url(path))
                .query(&[("ref", self.branch.as_str())]),
        );

        let parsed: ContentsResponse = match self.runtime.block_on(async {
            let resp = request.send().await?;
            match resp.status() {
                StatusCode::NOT_FOUND => Ok(None),
                s if s.is_success() => {
                    Ok::<_, StoreError>(Some(resp.json::<ContentsResponse>().await?))
                }
                _ => Err(api_error(resp).await),
            }
        })? {
            Some(parsed) => parsed,
            None => return Ok(None),
        };

        let packed: String = parsed
            .content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = STANDARD
            .decode(packed)
            .map_err(|e| StoreError::Backend(format!("{path}: bad base64 content: {e}")))?;
        let content = String::from_utf8(bytes)
            .map_err(|e| StoreError::Backend(format!("{path}: content is not UTF-8: {e}")))?;
        Ok(Some(Blob {
            content,
            sha: parsed.sha,
        }))
    }

    fn create(&self, path: &str, message: &str, content: &str) -> Result<String, StoreError> {
        self.put(path, message, content, None)
    }

    fn update(
        &self,
        path: &str,
        message: &str,
        content: &str,
        sha: &str,
    ) -> Result<String, StoreError> {
        self.put(path, message, content, Some(sha))
    }

    fn describe(&self) -> String {
        format!("github:{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

async fn api_error(resp: Response) -> StoreError {
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v["message"].as_str().map(str::to_string))
        .unwrap_or(text);
    StoreError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn store(server: &Server) -> GitHubBlobStore {
        GitHubBlobStore::new(
            &server.url(),
            "belfast",
            "crawl",
            "main",
            Some("t0ken".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn get_decodes_wrapped_base64() {
        let mut server = Server::new();
        let encoded = STANDARD.encode("Name,CurrentPub\nMark,1\n");
        let (head, tail) = encoded.split_at(10);
        let mock = server
            .mock("GET", "/repos/belfast/crawl/contents/participants.csv")
            .match_query(Matcher::UrlEncoded("ref".into(), "main".into()))
            .match_header("authorization", "Bearer t0ken")
            .with_status(200)
            .with_body(json!({ "content": format!("{head}\n{tail}\n"), "sha": "abc123" }).to_string())
            .create();

        let blob = store(&server).get("participants.csv").unwrap().unwrap();
        assert_eq!(blob.content, "Name,CurrentPub\nMark,1\n");
        assert_eq!(blob.sha, "abc123");
        mock.assert();
    }

    #[test]
    fn missing_file_is_none() {
        let mut server = Server::new();
        server
            .mock("GET", "/repos/belfast/crawl/contents/punishments.csv")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create();

        assert!(store(&server).get("punishments.csv").unwrap().is_none());
    }

    #[test]
    fn update_sends_sha_and_returns_new_one() {
        let mut server = Server::new();
        let mock = server
            .mock("PUT", "/repos/belfast/crawl/contents/participants.csv")
            .match_body(Matcher::PartialJson(json!({
                "sha": "old",
                "branch": "main",
                "content": STANDARD.encode("data"),
            })))
            .with_status(200)
            .with_body(r#"{"content":{"sha":"new"}}"#)
            .create();

        let sha = store(&server)
            .update("participants.csv", "Update participants", "data", "old")
            .unwrap();
        assert_eq!(sha, "new");
        mock.assert();
    }

    #[test]
    fn stale_sha_is_a_conflict() {
        let mut server = Server::new();
        server
            .mock("PUT", "/repos/belfast/crawl/contents/participants.csv")
            .with_status(409)
            .with_body(r#"{"message":"participants.csv does not match old"}"#)
            .create();

        let err = store(&server)
            .update("participants.csv", "msg", "data", "old")
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn create_over_existing_file_is_a_conflict() {
        let mut server = Server::new();
        server
            .mock("PUT", "/repos/belfast/crawl/contents/participants.csv")
            .with_status(422)
            .with_body(r#"{"message":"Invalid request. \"sha\" wasn't supplied."}"#)
            .create();

        let err = store(&server)
            .create("participants.csv", "msg", "data")
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn other_failures_carry_status_and_message() {
        let mut server = Server::new();
        server
            .mock("GET", "/repos/belfast/crawl/contents/participants.csv")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"message":"Bad credentials"}"#)
            .create();

        match store(&server).get("participants.csv").unwrap_err() {
            StoreError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Bad credentials");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn path_segments_are_encoded() {
        let server = Server::new();
        let store = store(&server);
        assert!(store
            .contents_url("ledger/the crawl.csv")
            .ends_with("/repos/belfast/crawl/contents/ledger/the%20crawl.csv"));
    }

    #[test]
    fn authenticated_user_returns_login() {
        let mut server = Server::new();
        server
            .mock("GET", "/user")
            .with_status(200)
            .with_body(r#"{"login":"santa"}"#)
            .create();

        assert_eq!(store(&server).authenticated_user().unwrap(), "santa");
    }

    #[test]
    fn describe_names_repo_and_branch() {
        let server = Server::new();
        assert_eq!(store(&server).describe(), "github:belfast/crawl@main");
    }
}
