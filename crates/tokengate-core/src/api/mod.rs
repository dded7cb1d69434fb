//! Authentication backend boundary.
//!
//! `AuthClient` is the logical contract (login, refresh, profile). Two
//! implementations ship with the crate:
//! - `HttpAuthClient`: JSON over HTTPS via reqwest
//! - `DemoAuthClient`: an in-process backend with a single demo account

pub mod client;
pub mod demo;
pub mod error;
pub mod models;

#[cfg(test)]
pub(crate) mod mock;

use futures::future::BoxFuture;

use crate::auth::Profile;

pub use client::HttpAuthClient;
pub use demo::DemoAuthClient;
pub use error::AuthError;
pub use models::{LoginResponse, RefreshResponse};

pub trait AuthClient: Send + Sync {
    /// Exchange credentials for tokens. Rejection is `InvalidCredentials`.
    fn login<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<LoginResponse, AuthError>>;

    /// Mint a new access token. Rejection is `InvalidRefreshToken`.
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshResponse, AuthError>>;

    fn fetch_profile<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<Profile, AuthError>>;
}
