use serde::Deserialize;
use thiserror::Error;

/// Failures crossing the authentication backend boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Login rejected; the message is shown to the user as-is
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    InvalidRefreshToken(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not authenticated")]
    Unauthenticated,
}

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";
pub const INVALID_REFRESH_TOKEN_MESSAGE: &str = "Invalid refresh token";

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Which backend call produced a response; decides how a rejection reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Refresh,
    Profile,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AuthError::InvalidResponse(e.to_string())
        } else {
            AuthError::NetworkError(e.to_string())
        }
    }
}

impl AuthError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Backend-supplied `{"message": ...}`, if any
    fn rejection_message(body: &str, fallback: &str) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.message)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str, endpoint: Endpoint) -> Self {
        let truncated = Self::truncate_body(body);
        match (status.as_u16(), endpoint) {
            (400 | 401 | 403, Endpoint::Login) => AuthError::InvalidCredentials(
                Self::rejection_message(body, INVALID_CREDENTIALS_MESSAGE),
            ),
            (400 | 401 | 403, Endpoint::Refresh) => AuthError::InvalidRefreshToken(
                Self::rejection_message(body, INVALID_REFRESH_TOKEN_MESSAGE),
            ),
            (401 | 403, Endpoint::Profile) => AuthError::Unauthenticated,
            (408 | 429, _) => AuthError::NetworkError(format!("Status {}", status)),
            (500..=599, _) => AuthError::NetworkError(format!("Server error: {}", truncated)),
            _ => AuthError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;

    #[test]
    fn test_login_rejection_uses_default_message() {
        let err = AuthError::from_status(StatusCode::UNAUTHORIZED, "", Endpoint::Login);
        assert_eq!(err.to_string(), "Invalid email or password");
    }

    #[test]
    fn test_login_rejection_prefers_backend_message() {
        let err = AuthError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Account locked"}"#,
            Endpoint::Login,
        );
        assert_eq!(err, AuthError::InvalidCredentials("Account locked".to_string()));
    }

    #[test]
    fn test_refresh_rejection() {
        let err = AuthError::from_status(StatusCode::FORBIDDEN, "nope", Endpoint::Refresh);
        assert_eq!(
            err,
            AuthError::InvalidRefreshToken(INVALID_REFRESH_TOKEN_MESSAGE.to_string())
        );
    }

    #[test]
    fn test_server_errors_are_network_errors() {
        let err = AuthError::from_status(StatusCode::BAD_GATEWAY, "upstream", Endpoint::Login);
        assert!(matches!(err, AuthError::NetworkError(_)));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(400);
        let truncated = AuthError::truncate_body(&body);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }
}
