//! Wire types exchanged with the authentication backend.
//!
//! Responses are validated on ingress so the lifecycle manager only ever sees
//! usable tokens and a positive TTL.

use serde::{Deserialize, Serialize};

use crate::auth::Profile;

use super::AuthError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LoginResponse {
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    #[serde(rename = "ttl")]
    pub ttl_seconds: u64,
    pub profile: Profile,
}

impl LoginResponse {
    pub fn validate(&self) -> Result<(), AuthError> {
        require_token("access token", &self.access_token)?;
        require_token("refresh token", &self.refresh_token)?;
        require_ttl(self.ttl_seconds)?;
        if self.profile.username.trim().is_empty() {
            return Err(AuthError::InvalidResponse(
                "profile is missing a username".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct RefreshResponse {
    #[serde(rename = "token")]
    pub access_token: String,
    /// Absent when the backend keeps the current refresh token
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,
    #[serde(rename = "ttl")]
    pub ttl_seconds: u64,
}

impl RefreshResponse {
    pub fn validate(&self) -> Result<(), AuthError> {
        require_token("access token", &self.access_token)?;
        require_ttl(self.ttl_seconds)
    }
}

fn require_token(what: &str, token: &str) -> Result<(), AuthError> {
    if token.trim().is_empty() {
        return Err(AuthError::InvalidResponse(format!("{} is empty", what)));
    }
    Ok(())
}

fn require_ttl(ttl_seconds: u64) -> Result<(), AuthError> {
    if ttl_seconds == 0 {
        return Err(AuthError::InvalidResponse("ttl must be positive".to_string()));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    pub refresh_token: &'a str,
}
