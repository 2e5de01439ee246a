//! services/client/src/adapters/http_auth.rs
//!
//! This module contains the HTTP adapter for the token-exchange endpoints.
//! It implements the `AuthService` port from the `core` crate using `reqwest`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use snapsolve_core::domain::{LoginOutcome, TokenPair, UserInfo};
use snapsolve_core::ports::{AuthService, PortError, PortResult};
use std::time::Duration;
use tracing::{debug, error};

/// Longest body excerpt carried in a `PortError::Rejected`.
const BODY_SNIPPET_LEN: usize = 200;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `AuthService` port over HTTP.
#[derive(Clone)]
pub struct HttpAuthAdapter {
    http_client: reqwest::Client,
    api_base_url: String,
}

impl HttpAuthAdapter {
    /// Creates a new `HttpAuthAdapter` with a per-request timeout.
    pub fn new(api_base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http_client, api_base_url))
    }

    pub fn with_client(http_client: reqwest::Client, api_base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            api_base_url: api_base_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    /// Checks the status and decodes the JSON body of an auth response.
    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> PortResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            error!(status = %status, endpoint, "Auth endpoint rejected the request");
            return Err(PortError::Rejected {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(endpoint, error = %e, "Auth endpoint returned an unreadable body");
            PortError::Malformed(format!("{}: {}", e, snippet(&body)))
        })
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Serialize)]
struct TestUserRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPairRecord {
    access_token: String,
    refresh_token: String,
}

impl TokenPairRecord {
    fn to_domain(self) -> TokenPair {
        TokenPair {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderLoginRecord {
    #[serde(flatten)]
    tokens: TokenPairRecord,
    #[serde(default)]
    user: Option<UserRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    id: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    credits: i64,
    #[serde(default)]
    subscription_expires_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    fn to_domain(self) -> UserInfo {
        UserInfo {
            id: self.id,
            email: self.email,
            name: self.name,
            avatar: self.avatar,
            credits: self.credits,
            subscription_expires_at: self.subscription_expires_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRecord {
    access_token: String,
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for HttpAuthAdapter {
    async fn exchange_provider_token(&self, id_token: &str) -> PortResult<LoginOutcome> {
        let endpoint = self.endpoint("/auth/google-login");
        debug!("Exchanging identity-provider token");

        // The backend reads the token from either the form or the query string,
        // under either key, so it is sent in every location.
        let response = self
            .http_client
            .post(&endpoint)
            .query(&[("idToken", id_token)])
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("idToken", id_token), ("credential", id_token)])
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let record: ProviderLoginRecord = Self::decode(response, &endpoint).await?;
        Ok(LoginOutcome {
            tokens: record.tokens.to_domain(),
            user: record.user.map(UserRecord::to_domain),
        })
    }

    async fn exchange_test_credential(&self, email: &str) -> PortResult<TokenPair> {
        let endpoint = self.endpoint("/auth/test-user");
        debug!(email, "Exchanging test credential");

        let response = self
            .http_client
            .post(&endpoint)
            .json(&TestUserRequest { email })
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let record: TokenPairRecord = Self::decode(response, &endpoint).await?;
        Ok(record.to_domain())
    }

    async fn refresh(&self, refresh_token: &str) -> PortResult<String> {
        let endpoint = self.endpoint("/auth/refresh");
        debug!("Refreshing access token");

        let response = self
            .http_client
            .post(&endpoint)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let record: RefreshRecord = Self::decode(response, &endpoint).await?;
        Ok(record.access_token)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Timeout
    } else {
        PortError::Unexpected(e.to_string())
    }
}

/// Truncates a response body on a character boundary.
pub(crate) fn snippet(body: &str) -> String {
    match body.char_indices().nth(BODY_SNIPPET_LEN) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_base_url() {
        let adapter = HttpAuthAdapter::with_client(reqwest::Client::new(), "http://localhost:8000");
        assert_eq!(
            adapter.endpoint("/auth/refresh"),
            "http://localhost:8000/auth/refresh"
        );
    }

    #[test]
    fn provider_login_record_with_user() {
        let json = r#"{
            "accessToken": "a1",
            "refreshToken": "r1",
            "user": {
                "id": "u-1",
                "email": "ada@example.com",
                "name": null,
                "avatar": null,
                "credits": 12,
                "subscriptionExpiresAt": "2026-01-01T00:00:00Z"
            }
        }"#;
        let record: ProviderLoginRecord = serde_json::from_str(json).unwrap();
        let user = record.user.unwrap().to_domain();
        assert_eq!(record.tokens.to_domain().access_token, "a1");
        assert_eq!(user.credits, 12);
        assert!(user.subscription_expires_at.is_some());
        assert!(user.name.is_none());
    }

    #[test]
    fn provider_login_record_without_user() {
        let record: ProviderLoginRecord =
            serde_json::from_str(r#"{"accessToken":"a","refreshToken":"r"}"#).unwrap();
        assert!(record.user.is_none());
    }

    #[test]
    fn refresh_request_is_camel_case() {
        let json = serde_json::to_string(&RefreshRequest { refresh_token: "r1" }).unwrap();
        assert_eq!(json, r#"{"refreshToken":"r1"}"#);
    }

    //-------------------------------------------------------------------------------------
    // Against a local HTTP server
    //-------------------------------------------------------------------------------------

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves one canned response and hands back the raw request it received.
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });
        (base, server)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    fn adapter(base: String) -> HttpAuthAdapter {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpAuthAdapter::with_client(client, base)
    }

    fn request_body(request: &str) -> &str {
        request.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or_default()
    }

    #[tokio::test]
    async fn provider_login_sends_token_in_query_and_form() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"accessToken":"a1","refreshToken":"r1","user":{"id":"u-1","email":"ada@example.com","credits":3}}"#,
        )
        .await;

        let outcome = adapter(base).exchange_provider_token("tok+1").await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("POST /auth/google-login?idToken=tok%2B1 HTTP/1.1\r\n"));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/x-www-form-urlencoded"));
        assert_eq!(request_body(&request), "idToken=tok%2B1&credential=tok%2B1");
        assert_eq!(outcome.tokens.access_token, "a1");
        assert_eq!(outcome.user.map(|u| u.credits), Some(3));
    }

    #[tokio::test]
    async fn test_user_login_posts_json_email() {
        let (base, server) =
            serve_once("200 OK", r#"{"accessToken":"a1","refreshToken":"r1"}"#).await;

        let tokens = adapter(base)
            .exchange_test_credential("qa@example.com")
            .await
            .unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("POST /auth/test-user HTTP/1.1\r\n"));
        assert_eq!(request_body(&request), r#"{"email":"qa@example.com"}"#);
        assert_eq!(tokens.refresh_token, "r1");
    }

    #[tokio::test]
    async fn rejected_refresh_carries_status_and_body() {
        let (base, server) = serve_once("401 Unauthorized", "refresh token expired").await;

        let result = adapter(base).refresh("r1").await;
        let request = server.await.unwrap();

        assert!(request.starts_with("POST /auth/refresh HTTP/1.1\r\n"));
        assert_eq!(request_body(&request), r#"{"refreshToken":"r1"}"#);
        assert_eq!(
            result,
            Err(PortError::Rejected {
                status: 401,
                body: "refresh token expired".to_string()
            })
        );
    }

    #[tokio::test]
    async fn unreadable_success_body_is_malformed() {
        let (base, server) = serve_once("200 OK", "<html>gateway</html>").await;

        let result = adapter(base).refresh("r1").await;
        server.await.unwrap();

        match result {
            Err(PortError::Malformed(reason)) => assert!(reason.contains("<html>gateway</html>")),
            other => panic!("expected a malformed body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn long_error_bodies_are_truncated() {
        let body = "x".repeat(BODY_SNIPPET_LEN * 3);
        let (base, server) = serve_once("500 Internal Server Error", &body).await;

        let result = adapter(base).exchange_test_credential("qa@example.com").await;
        server.await.unwrap();

        match result {
            Err(PortError::Rejected { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body.chars().count(), BODY_SNIPPET_LEN + 1);
            }
            other => panic!("expected a rejection, got {:?}", other),
        }
    }

    #[test]
    fn snippet_truncates_long_bodies() {
        let long = "é".repeat(BODY_SNIPPET_LEN + 10);
        let cut = snippet(&long);
        assert_eq!(cut.chars().count(), BODY_SNIPPET_LEN + 1);
        assert_eq!(snippet("short"), "short");
    }
}
