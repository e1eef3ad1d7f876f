//! GitHub's implementation of the device-authorization endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::debug;

use super::device::{DeviceAuthEndpoint, DeviceSession, PollOutcome};
use super::AuthError;

const DEVICE_CODE_PATH: &str = "/login/device/code";
const ACCESS_TOKEN_PATH: &str = "/login/oauth/access_token";
const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// GitHub's default when the response omits an interval.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Response from POST /login/device/code.
#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    #[serde(default)]
    interval: Option<u64>,
}

/// Polling response that can be either a token or an error code.
///
/// `#[serde(untagged)]` tries variants in order; `Granted` must stay first so
/// that a body with `access_token` never falls through to `Error`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccessTokenResponse {
    Granted { access_token: String },
    Error(AccessTokenError),
}

#[derive(Debug, Deserialize)]
struct AccessTokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    interval: Option<u64>,
}

impl AccessTokenError {
    fn into_outcome(self) -> Result<PollOutcome, AuthError> {
        match self.error.as_str() {
            "authorization_pending" => Ok(PollOutcome::Pending),
            "slow_down" => Ok(PollOutcome::SlowDown(self.interval)),
            "expired_token" => Ok(PollOutcome::Expired),
            "access_denied" => Ok(PollOutcome::Denied),
            _ => Err(AuthError::Transport(
                self.error_description.unwrap_or(self.error),
            )),
        }
    }
}

/// Device flow client for a GitHub OAuth app.
pub struct GitHubDeviceEndpoint {
    client: Client,
    auth_url: String,
    client_id: String,
    scope: String,
}

impl GitHubDeviceEndpoint {
    /// # Arguments
    /// * `auth_url` - Base URL of the GitHub web host (e.g. `https://github.com`)
    /// * `client_id` - OAuth app client id; device flow needs no secret
    /// * `scope` - Space separated OAuth scopes
    pub fn new(client: Client, auth_url: String, client_id: String, scope: String) -> Self {
        Self {
            client,
            auth_url: auth_url.trim_end_matches('/').to_string(),
            client_id,
            scope,
        }
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<reqwest::Response, AuthError> {
        let url = format!("{}{}", self.auth_url, path);
        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .form(form)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl DeviceAuthEndpoint for GitHubDeviceEndpoint {
    async fn request_device_code(&self) -> Result<DeviceSession, AuthError> {
        let response = self
            .post_form(
                DEVICE_CODE_PATH,
                &[("client_id", self.client_id.as_str()), ("scope", self.scope.as_str())],
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "(failed to read error body)".to_string());
            return Err(AuthError::Transport(format!("HTTP {}: {}", status, body)));
        }

        let body: DeviceCodeResponse = response.json().await?;
        debug!(expires_in = body.expires_in, interval = ?body.interval, "Device code issued");

        Ok(DeviceSession::new(
            body.device_code,
            body.user_code,
            body.verification_uri,
            Duration::from_secs(body.expires_in),
            body.interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        ))
    }

    async fn poll_for_token(&self, device_code: &str) -> Result<PollOutcome, AuthError> {
        let response = self
            .post_form(
                ACCESS_TOKEN_PATH,
                &[
                    ("client_id", self.client_id.as_str()),
                    ("device_code", device_code),
                    ("grant_type", DEVICE_GRANT_TYPE),
                ],
            )
            .await?;

        // Pending/denied/expired arrive as JSON error bodies, sometimes with a
        // 4xx status, so only server errors short-circuit here.
        let status = response.status();
        if status.is_server_error() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "(failed to read error body)".to_string());
            return Err(AuthError::Transport(format!("HTTP {}: {}", status, body)));
        }

        match response.json::<AccessTokenResponse>().await? {
            AccessTokenResponse::Granted { access_token } => Ok(PollOutcome::Granted(access_token)),
            AccessTokenResponse::Error(err) => err.into_outcome(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint(server: &MockServer) -> GitHubDeviceEndpoint {
        GitHubDeviceEndpoint::new(
            Client::new(),
            server.uri(),
            "Iv1.test".to_string(),
            "repo".to_string(),
        )
    }

    async fn mount_poll_response(server: &MockServer, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path(ACCESS_TOKEN_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string(body.to_string()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_request_device_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DEVICE_CODE_PATH))
            .and(header_matcher("accept", "application/json"))
            .and(body_string_contains("client_id=Iv1.test"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"device_code":"D1","user_code":"ABCD-1234","verification_uri":"https://github.com/login/device","expires_in":900,"interval":5}"#,
            ))
            .mount(&server)
            .await;

        let session = endpoint(&server).request_device_code().await.unwrap();

        assert_eq!(session.device_code, "D1");
        assert_eq!(session.user_code, "ABCD-1234");
        assert_eq!(session.verification_uri, "https://github.com/login/device");
        assert_eq!(session.poll_interval_secs, 5);
        assert!(!session.is_expired());
    }

    #[tokio::test]
    async fn test_request_device_code_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DEVICE_CODE_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let result = endpoint(&server).request_device_code().await;

        assert!(matches!(result, Err(AuthError::Transport(msg)) if msg.contains("404")));
    }

    #[tokio::test]
    async fn test_poll_granted() {
        let server = MockServer::start().await;
        mount_poll_response(
            &server,
            200,
            r#"{"access_token":"gho_abc","token_type":"bearer","scope":"repo"}"#,
        )
        .await;

        let outcome = endpoint(&server).poll_for_token("D1").await.unwrap();

        assert_eq!(outcome, PollOutcome::Granted("gho_abc".to_string()));
    }

    #[tokio::test]
    async fn test_poll_pending() {
        let server = MockServer::start().await;
        mount_poll_response(&server, 200, r#"{"error":"authorization_pending"}"#).await;

        let outcome = endpoint(&server).poll_for_token("D1").await.unwrap();

        assert_eq!(outcome, PollOutcome::Pending);
    }

    #[tokio::test]
    async fn test_poll_slow_down_carries_interval() {
        let server = MockServer::start().await;
        mount_poll_response(&server, 200, r#"{"error":"slow_down","interval":10}"#).await;

        let outcome = endpoint(&server).poll_for_token("D1").await.unwrap();

        assert_eq!(outcome, PollOutcome::SlowDown(Some(10)));
    }

    #[tokio::test]
    async fn test_poll_denied_and_expired() {
        let server = MockServer::start().await;
        mount_poll_response(&server, 400, r#"{"error":"access_denied"}"#).await;
        assert_eq!(
            endpoint(&server).poll_for_token("D1").await.unwrap(),
            PollOutcome::Denied
        );

        let server = MockServer::start().await;
        mount_poll_response(&server, 400, r#"{"error":"expired_token"}"#).await;
        assert_eq!(
            endpoint(&server).poll_for_token("D1").await.unwrap(),
            PollOutcome::Expired
        );
    }

    #[tokio::test]
    async fn test_poll_unknown_error_is_transport() {
        let server = MockServer::start().await;
        mount_poll_response(
            &server,
            200,
            r#"{"error":"incorrect_client_credentials","error_description":"The client_id is not valid."}"#,
        )
        .await;

        let result = endpoint(&server).poll_for_token("D1").await;

        assert!(matches!(result, Err(AuthError::Transport(msg)) if msg.contains("client_id")));
    }

    #[tokio::test]
    async fn test_poll_server_error() {
        let server = MockServer::start().await;
        mount_poll_response(&server, 502, "bad gateway").await;

        let result = endpoint(&server).poll_for_token("D1").await;

        assert!(matches!(result, Err(AuthError::Transport(_))));
    }
}
