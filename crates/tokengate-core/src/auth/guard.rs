use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::gate::SessionGate;

/// Default destination for unauthenticated navigation
pub const DEFAULT_LOGIN_DESTINATION: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admit,
    /// Send the user here instead, replacing the attempted navigation
    Redirect(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub login_destination: String,
    /// Path prefixes reachable without a session
    pub public_paths: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            login_destination: DEFAULT_LOGIN_DESTINATION.to_string(),
            public_paths: vec![DEFAULT_LOGIN_DESTINATION.to_string()],
        }
    }
}

impl GuardConfig {
    fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with(['/', '?', '#']))
        })
    }
}

/// Admission check for protected destinations. Nothing is cached: every
/// navigation consults the gate's current state.
pub struct RouteGuard {
    gate: Arc<SessionGate>,
    config: GuardConfig,
}

impl RouteGuard {
    pub fn new(gate: Arc<SessionGate>, config: GuardConfig) -> Self {
        Self { gate, config }
    }

    pub fn authorize(&self) -> Admission {
        if self.gate.is_authenticated() {
            Admission::Admit
        } else {
            Admission::Redirect(self.config.login_destination.clone())
        }
    }

    pub fn authorize_path(&self, path: &str) -> Admission {
        if self.config.is_public(path) {
            return Admission::Admit;
        }
        let admission = self.authorize();
        debug!(path = path, ?admission, "Route authorization");
        admission
    }

    pub fn login_destination(&self) -> &str {
        &self.config.login_destination
    }
}
