//! API client for the GitHub REST API.
//!
//! `ApiClient` holds no login state of its own. Callers pass the token for
//! each use through [`ApiClient::with_token`], which shares the connection
//! pool with the base client.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::{IdentityError, IdentityResolver};
use crate::models::{FileItem, FileKind, Repository};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Largest page GitHub serves for repository listings.
const REPOS_PER_PAGE: u32 = 100;

/// Maximum number of retries for rate-limited requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    id: u64,
    name: String,
    full_name: String,
    private: bool,
    description: Option<String>,
    owner: RepoOwner,
}

impl From<RepoResponse> for Repository {
    fn from(repo: RepoResponse) -> Self {
        Repository {
            id: repo.id,
            owner: repo.owner.login,
            name: repo.name,
            full_name: repo.full_name,
            private: repo.private,
            description: repo.description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
    size: Option<u64>,
    download_url: Option<String>,
}

impl From<ContentEntry> for FileItem {
    fn from(entry: ContentEntry) -> Self {
        let kind = if entry.entry_type == "dir" {
            FileKind::Dir
        } else {
            FileKind::File
        };
        FileItem {
            name: entry.name,
            path: entry.path,
            kind,
            size: entry.size,
            download_url: entry.download_url,
        }
    }
}

/// The contents endpoint answers with an array for directories and a single
/// object for files.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentEntry>),
    Single(serde_json::Value),
}

/// API client for GitHub.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client without a token.
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. `https://api.github.com`
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("copit/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Request-scoped client carrying `token`, sharing the connection pool.
    pub fn with_token(&self, token: &str) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.to_string()),
        }
    }

    /// The underlying HTTP client, for collaborators that talk to other
    /// GitHub hosts.
    pub fn http_client(&self) -> Client {
        self.client.clone()
    }

    fn headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static(GITHUB_API_VERSION),
        );
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))
                    .context("Token contains invalid header characters")?,
            );
        }
        Ok(headers)
    }

    /// Send a GET, retrying with exponential backoff while rate limited.
    async fn send_get(&self, url: &str) -> Result<reqwest::Response> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.headers()?)
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_status(status, &body);
            if !matches!(err, ApiError::RateLimited) {
                return Err(err.into());
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited.into());
            }
            warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2;
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.send_get(url).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    /// The account the current token belongs to.
    pub async fn fetch_authenticated_user(&self) -> Result<String> {
        let url = format!("{}/user", self.base_url);
        let user: UserResponse = self.get(&url).await?;
        Ok(user.login)
    }

    /// Repositories owned by `username`, most recently updated first.
    pub async fn fetch_user_repositories(&self, username: &str) -> Result<Vec<Repository>> {
        let url = format!(
            "{}/users/{}/repos?per_page={}&sort=updated",
            self.base_url, username, REPOS_PER_PAGE
        );
        let repos: Vec<RepoResponse> = self.get(&url).await?;
        debug!(count = repos.len(), username = username, "Fetched repositories");
        Ok(repos.into_iter().map(Repository::from).collect())
    }

    /// Directory listing at `path` (empty for the repository root).
    ///
    /// Returns an empty list when `path` names a file rather than a directory.
    pub async fn fetch_repository_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Vec<FileItem>> {
        let path = path.trim_matches('/');
        let url = if path.is_empty() {
            format!("{}/repos/{}/{}/contents", self.base_url, owner, repo)
        } else {
            format!("{}/repos/{}/{}/contents/{}", self.base_url, owner, repo, path)
        };

        match self.get::<ContentsResponse>(&url).await? {
            ContentsResponse::Listing(entries) => {
                Ok(entries.into_iter().map(FileItem::from).collect())
            }
            ContentsResponse::Single(_) => Ok(Vec::new()),
        }
    }

    /// Raw bytes behind a `download_url` from a contents listing.
    pub async fn download_file(&self, download_url: &str) -> Result<Vec<u8>> {
        let response = self.send_get(download_url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to read file from {}", download_url))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl IdentityResolver for ApiClient {
    async fn resolve_identity(&self, token: &str) -> Result<String, IdentityError> {
        self.with_token(token)
            .fetch_authenticated_user()
            .await
            .map_err(|e| match e.downcast_ref::<ApiError>() {
                Some(api_err) if api_err.is_auth_failure() => IdentityError::Rejected,
                _ => IdentityError::Transport(format!("{:#}", e)),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_matcher, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_authenticated_user_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header_matcher("authorization", "Bearer tok_abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"login":"alice","id":1}"#))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap().with_token("tok_abc");

        assert_eq!(client.fetch_authenticated_user().await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_base_client_has_no_token() {
        let client = ApiClient::new("https://api.github.com/").unwrap();
        let scoped = client.with_token("tok");

        assert!(client.token.is_none());
        assert_eq!(scoped.token.as_deref(), Some("tok"));
        assert_eq!(scoped.base_url, "https://api.github.com");
    }

    #[tokio::test]
    async fn test_resolve_identity_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"message":"Bad credentials"}"#))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        let result = client.resolve_identity("revoked").await;

        assert!(matches!(result, Err(IdentityError::Rejected)));
    }

    #[tokio::test]
    async fn test_resolve_identity_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        let result = client.resolve_identity("tok").await;

        assert!(matches!(result, Err(IdentityError::Transport(_))));
    }

    #[tokio::test]
    async fn test_fetch_user_repositories() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alice/repos"))
            .and(query_param("per_page", "100"))
            .and(query_param("sort", "updated"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"id":42,"name":"dotfiles","full_name":"alice/dotfiles","private":false,"description":"My configs","owner":{"login":"alice"}},
                    {"id":43,"name":"notes","full_name":"alice/notes","private":true,"description":null,"owner":{"login":"alice"}}]"#,
            ))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap().with_token("tok");
        let repos = client.fetch_user_repositories("alice").await.unwrap();

        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].full_name, "alice/dotfiles");
        assert_eq!(repos[0].owner, "alice");
        assert_eq!(repos[0].description_display(), "My configs");
        assert!(repos[1].private);
        assert_eq!(repos[1].description_display(), "");
    }

    #[tokio::test]
    async fn test_fetch_repository_contents_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/dotfiles/contents/config"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"name":"nvim","path":"config/nvim","type":"dir","size":0,"download_url":null},
                    {"name":".zshrc","path":"config/.zshrc","type":"file","size":512,"download_url":"https://raw.example/config/.zshrc"}]"#,
            ))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        let items = client
            .fetch_repository_contents("alice", "dotfiles", "/config/")
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert!(items[0].is_dir());
        assert_eq!(items[1].kind, FileKind::File);
        assert_eq!(items[1].download_url.as_deref(), Some("https://raw.example/config/.zshrc"));
    }

    #[tokio::test]
    async fn test_fetch_repository_contents_single_file_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/dotfiles/contents/README.md"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"name":"README.md","path":"README.md","type":"file","size":10,"download_url":"https://raw.example/README.md"}"#,
            ))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        let items = client
            .fetch_repository_contents("alice", "dotfiles", "README.md")
            .await
            .unwrap();

        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"login":"alice"}"#))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap().with_token("tok");

        assert_eq!(client.fetch_authenticated_user().await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_download_file_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/raw/.editorconfig"))
            .respond_with(ResponseTemplate::new(200).set_body_string("root = true\n"))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        let bytes = client
            .download_file(&format!("{}/raw/.editorconfig", server.uri()))
            .await
            .unwrap();

        assert_eq!(bytes, b"root = true\n");
    }

    #[tokio::test]
    async fn test_not_found_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/missing/contents"))
            .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"message":"Not Found"}"#))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        let err = client
            .fetch_repository_contents("alice", "missing", "")
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::NotFound(_))));
    }
}
