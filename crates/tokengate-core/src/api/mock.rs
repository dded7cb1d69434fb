use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::Notify;

use crate::auth::Profile;

use super::demo::DemoAuthClient;
use super::{AuthClient, AuthError, LoginResponse, RefreshResponse};

/// Scriptable backend for tests. Counts calls and can hold logins pending
/// until `release()` is called.
pub(crate) struct MockAuthClient {
    login_result: Mutex<Result<LoginResponse, AuthError>>,
    refresh_result: Mutex<Result<RefreshResponse, AuthError>>,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    hold: Option<Arc<Notify>>,
}

impl MockAuthClient {
    pub fn new() -> Self {
        Self {
            login_result: Mutex::new(Ok(LoginResponse {
                access_token: "mock-access".to_string(),
                refresh_token: "mock-refresh".to_string(),
                ttl_seconds: 3600,
                profile: DemoAuthClient::demo_profile(),
            })),
            refresh_result: Mutex::new(Ok(RefreshResponse {
                access_token: "mock-access-2".to_string(),
                refresh_token: None,
                ttl_seconds: 1800,
            })),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            hold: None,
        }
    }

    /// Logins wait for `release()` before answering.
    pub fn held() -> (Self, Arc<Notify>) {
        let notify = Arc::new(Notify::new());
        let client = Self {
            hold: Some(Arc::clone(&notify)),
            ..Self::new()
        };
        (client, notify)
    }

    pub fn set_login(&self, result: Result<LoginResponse, AuthError>) {
        *self.login_result.lock().unwrap() = result;
    }

    pub fn set_refresh(&self, result: Result<RefreshResponse, AuthError>) {
        *self.refresh_result.lock().unwrap() = result;
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

impl AuthClient for MockAuthClient {
    fn login<'a>(
        &'a self,
        _username: &'a str,
        _password: &'a str,
    ) -> BoxFuture<'a, Result<LoginResponse, AuthError>> {
        async move {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(hold) = &self.hold {
                hold.notified().await;
            }
            self.login_result.lock().unwrap().clone()
        }
        .boxed()
    }

    fn refresh<'a>(
        &'a self,
        _refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshResponse, AuthError>> {
        async move {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refresh_result.lock().unwrap().clone()
        }
        .boxed()
    }

    fn fetch_profile<'a>(
        &'a self,
        _access_token: &'a str,
    ) -> BoxFuture<'a, Result<Profile, AuthError>> {
        async move {
            let mut profile = DemoAuthClient::demo_profile();
            profile.roles.insert("auditor".to_string());
            Ok(profile)
        }
        .boxed()
    }
}
