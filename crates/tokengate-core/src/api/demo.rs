//! In-process authentication backend.
//!
//! Accepts a single demo account and issues opaque tokens with a one hour
//! TTL. Useful for local development and for exercising the lifecycle
//! without a server.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};

use crate::auth::Profile;

use super::error::{INVALID_CREDENTIALS_MESSAGE, INVALID_REFRESH_TOKEN_MESSAGE};
use super::{AuthClient, AuthError, LoginResponse, RefreshResponse};

pub const DEMO_USERNAME: &str = "admin@example.com";
pub const DEMO_PASSWORD: &str = "password";

/// Token time-to-live in seconds (1 hour)
pub const DEMO_TTL_SECONDS: u64 = 3600;

#[derive(Debug, Default)]
pub struct DemoAuthClient {
    latency: Option<Duration>,
    issued: AtomicU64,
}

impl DemoAuthClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, simulating a network round trip.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn demo_profile() -> Profile {
        Profile {
            username: "admin".to_string(),
            full_name: "Admin User".to_string(),
            email: DEMO_USERNAME.to_string(),
            profile_picture_url: "/assets/profile-default.png".to_string(),
            roles: BTreeSet::from(["admin".to_string()]),
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn next_access_token(&self) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        format!("demo-access-{}", n)
    }
}

impl AuthClient for DemoAuthClient {
    fn login<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<LoginResponse, AuthError>> {
        async move {
            self.simulate_latency().await;
            if username != DEMO_USERNAME || password != DEMO_PASSWORD {
                return Err(AuthError::InvalidCredentials(
                    INVALID_CREDENTIALS_MESSAGE.to_string(),
                ));
            }
            Ok(LoginResponse {
                access_token: self.next_access_token(),
                refresh_token: "demo-refresh".to_string(),
                ttl_seconds: DEMO_TTL_SECONDS,
                profile: Self::demo_profile(),
            })
        }
        .boxed()
    }

    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshResponse, AuthError>> {
        async move {
            self.simulate_latency().await;
            if refresh_token.is_empty() {
                return Err(AuthError::InvalidRefreshToken(
                    INVALID_REFRESH_TOKEN_MESSAGE.to_string(),
                ));
            }
            // The refresh token stays the same
            Ok(RefreshResponse {
                access_token: self.next_access_token(),
                refresh_token: Some(refresh_token.to_string()),
                ttl_seconds: DEMO_TTL_SECONDS,
            })
        }
        .boxed()
    }

    fn fetch_profile<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<Profile, AuthError>> {
        async move {
            self.simulate_latency().await;
            if access_token.is_empty() {
                return Err(AuthError::Unauthenticated);
            }
            Ok(Self::demo_profile())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_login_accepts_only_demo_account() {
        let client = DemoAuthClient::new();

        let ok = client.login(DEMO_USERNAME, DEMO_PASSWORD).await.unwrap();
        assert_eq!(ok.ttl_seconds, 3600);
        assert_eq!(ok.profile.username, "admin");

        let err = client.login("bad", "bad").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid email or password");
    }

    #[tokio::test]
    async fn test_demo_refresh_keeps_refresh_token() {
        let client = DemoAuthClient::new();
        let first = client.login(DEMO_USERNAME, DEMO_PASSWORD).await.unwrap();

        let refreshed = client.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(refreshed.access_token, first.access_token);
        assert_eq!(refreshed.refresh_token.as_deref(), Some("demo-refresh"));

        let err = client.refresh("").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid refresh token");
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_latency_is_simulated() {
        let client = DemoAuthClient::with_latency(Duration::from_millis(1000));
        let started = tokio::time::Instant::now();

        client.fetch_profile("token").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }
}
