//! HTTP binding of the authentication backend contract.
//!
//! Endpoints, relative to the configured base URL:
//! - `POST /auth/login`    `{"username", "password"}`
//! - `POST /auth/refresh`  `{"refreshToken"}`
//! - `GET  /auth/profile`  bearer auth

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::Profile;

use super::error::Endpoint;
use super::models::{LoginRequest, RefreshRequest};
use super::{AuthClient, AuthError, LoginResponse, RefreshResponse};

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough for good UX.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpAuthClient {
    client: Client,
    base_url: String,
}

impl HttpAuthClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AuthError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/{}", self.base_url, path)
    }

    /// Check if response is successful, mapping failures by endpoint.
    async fn check_response(
        response: reqwest::Response,
        endpoint: Endpoint,
    ) -> Result<reqwest::Response, AuthError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(AuthError::from_status(status, &body, endpoint))
        }
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        endpoint: Endpoint,
    ) -> Result<T, AuthError> {
        let response = Self::check_response(response, endpoint).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| AuthError::InvalidResponse(format!("{:?} response: {}", endpoint, e)))
    }

    async fn post_login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let url = self.url("login");
        debug!(url = %url, "Sending login request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        Self::read_json(response, Endpoint::Login).await
    }

    async fn post_refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AuthError> {
        let url = self.url("refresh");
        debug!(url = %url, "Sending refresh request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        Self::read_json(response, Endpoint::Refresh).await
    }

    async fn get_profile(&self, access_token: &str) -> Result<Profile, AuthError> {
        let response = self
            .client
            .get(self.url("profile"))
            .header(header::ACCEPT, "application/json")
            .bearer_auth(access_token)
            .send()
            .await?;

        Self::read_json(response, Endpoint::Profile).await
    }
}

impl AuthClient for HttpAuthClient {
    fn login<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<LoginResponse, AuthError>> {
        self.post_login(username, password).boxed()
    }

    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshResponse, AuthError>> {
        self.post_refresh(refresh_token).boxed()
    }

    fn fetch_profile<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<Profile, AuthError>> {
        self.get_profile(access_token).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = HttpAuthClient::new("https://auth.example.com/api/").unwrap();
        assert_eq!(client.url("login"), "https://auth.example.com/api/auth/login");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        // Reserve a free port, then close it again so nothing is listening
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = HttpAuthClient::with_timeout(
            format!("http://127.0.0.1:{}", port),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client.login("admin", "password").await.unwrap_err();
        assert!(matches!(err, AuthError::NetworkError(_)), "got {:?}", err);
    }
}
