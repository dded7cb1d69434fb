//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `Session`/`Profile`: the authentication record and its durable projection
//! - `TokenLifecycleManager`: validity checks, login, refresh, logout
//! - `SessionGate`: process-wide authenticated/anonymous state
//! - `RouteGuard`: admit-or-redirect for protected destinations
//! - `CredentialStore`: remembered passwords in the OS keychain

pub mod credentials;
pub mod gate;
pub mod guard;
pub mod lifecycle;
pub mod session;

pub use credentials::CredentialStore;
pub use gate::{GateError, GateState, SessionGate};
pub use guard::{Admission, GuardConfig, RouteGuard};
pub use lifecycle::TokenLifecycleManager;
pub use session::{Profile, Session, StoredProfile, StoredSession};
