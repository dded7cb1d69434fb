//! Core library for tokengate.
//!
//! Client-side session and token lifecycle management:
//! - `store`: durable persistence of the current session (memory, files, OS keychain)
//! - `api`: the authentication backend boundary (HTTP and demo clients)
//! - `auth`: token lifecycle, the process-wide session gate and route guard
//! - `config`: on-disk configuration with environment overrides
//!
//! Everything is wired by constructor injection:
//! `RouteGuard` → `SessionGate` → `TokenLifecycleManager` → `SessionStore` / `AuthClient`.

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod store;

pub use api::{AuthClient, AuthError, DemoAuthClient, HttpAuthClient};
pub use auth::{
    Admission, GateError, GateState, GuardConfig, Profile, RouteGuard, Session, SessionGate,
    StoredProfile, StoredSession, TokenLifecycleManager,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, StoreKind};
pub use store::{SessionStore, StoreError};
