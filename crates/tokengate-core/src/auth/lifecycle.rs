//! Token lifecycle: validity, login, refresh and logout.
//!
//! `TokenLifecycleManager` is the only writer of the session store. Store
//! failures never escape it: an unreadable store reads as "no session".

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::api::{AuthClient, AuthError};
use crate::clock::Clock;
use crate::store::{SessionStore, StoreError};

use super::session::{Profile, Session, StoredProfile, StoredSession};

pub struct TokenLifecycleManager {
    store: Arc<dyn SessionStore>,
    client: Arc<dyn AuthClient>,
    clock: Arc<dyn Clock>,
    /// Full session as issued in this process; the store only keeps a projection.
    current: Mutex<Option<Session>>,
}

impl TokenLifecycleManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        client: Arc<dyn AuthClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            client,
            clock,
            current: Mutex::new(None),
        }
    }

    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Stored session, or `None` if absent or the store is unreadable.
    pub fn stored_session(&self) -> Option<StoredSession> {
        match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Session store unavailable, treating as signed out");
                None
            }
        }
    }

    /// Whether the stored access token is usable at `now`.
    pub fn is_valid(&self, now: i64) -> bool {
        self.stored_session()
            .map(|s| s.is_valid_at(now))
            .unwrap_or(false)
    }

    pub fn is_valid_now(&self) -> bool {
        self.is_valid(self.now())
    }

    /// Authenticate with the backend and persist the new session.
    /// On failure the store is left untouched.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.authenticate(username, password).await?;
        if let Err(e) = self.establish(&session) {
            warn!(error = %e, "Failed to persist session; it will not survive a restart");
        }
        Ok(session)
    }

    /// Exchange the stored refresh token for a new access token.
    /// A failed refresh leaves the stale session in place.
    pub async fn refresh(&self) -> Result<Session, AuthError> {
        let session = self.renew().await?;
        if let Err(e) = self.establish(&session) {
            warn!(error = %e, "Failed to persist refreshed session");
        }
        Ok(session)
    }

    /// Login round trip without any writes. Pair with `establish`.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let response = self.client.login(username, password).await?;
        response.validate()?;

        let session = Session::issue(
            response.access_token,
            response.refresh_token,
            response.ttl_seconds,
            response.profile,
            self.now(),
        );
        info!(
            username = %session.profile.username,
            expires_at = session.expires_at,
            "Login accepted"
        );
        Ok(session)
    }

    /// Refresh round trip without any writes. Pair with `establish`.
    pub async fn renew(&self) -> Result<Session, AuthError> {
        let stored = self.stored_session().ok_or_else(|| {
            AuthError::InvalidRefreshToken("No refresh token available".to_string())
        })?;

        let response = self.client.refresh(&stored.refresh_token).await?;
        response.validate()?;

        let profile = self.live_profile(&stored.profile);
        let refresh_token = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| stored.refresh_token.clone());

        let session = Session::issue(
            response.access_token,
            refresh_token,
            response.ttl_seconds,
            profile,
            self.now(),
        );
        debug!(expires_at = session.expires_at, "Access token renewed");
        Ok(session)
    }

    /// Make `session` the current one: persist it, then keep the full copy
    /// in memory. The in-memory copy is kept even if the store refuses it.
    pub fn establish(&self, session: &Session) -> Result<(), StoreError> {
        let saved = self.store.save(session);
        self.set_current(Some(session.clone()));
        saved
    }

    /// Clear the session. Always succeeds from the caller's perspective.
    pub fn logout(&self) {
        self.set_current(None);
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear session store on logout");
        }
        info!("Logged out");
    }

    /// Ask the backend for the full profile of the stored session.
    pub async fn fetch_profile(&self) -> Result<Profile, AuthError> {
        let token = self.access_token().ok_or(AuthError::Unauthenticated)?;
        let profile = self.client.fetch_profile(&token).await?;

        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = current.as_mut() {
            session.profile = profile.clone();
        }
        Ok(profile)
    }

    /// The session issued in this process, with its full profile.
    pub fn current_session(&self) -> Option<Session> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn stored_profile(&self) -> Option<StoredProfile> {
        self.stored_session().map(|s| s.profile)
    }

    /// Stored access token, regardless of expiry.
    pub fn access_token(&self) -> Option<String> {
        self.stored_session().map(|s| s.access_token)
    }

    fn set_current(&self, session: Option<Session>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = session;
    }

    /// Keep the in-memory profile across a refresh when it belongs to the
    /// stored user; otherwise fall back to the stored projection.
    fn live_profile(&self, stored: &StoredProfile) -> Profile {
        self.current_session()
            .map(|s| s.profile)
            .filter(|p| p.username == stored.username)
            .unwrap_or_else(|| stored.clone().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::demo::{DEMO_PASSWORD, DEMO_USERNAME};
    use crate::api::mock::MockAuthClient;
    use crate::api::{DemoAuthClient, RefreshResponse};
    use crate::clock::ManualClock;
    use crate::store::{
        EntrySessionStore, KeyValueBackend, MemoryBackend, SESSION_KEYS, TOKEN_EXPIRY_KEY,
    };

    const T0: i64 = 1_700_000_000_000;

    struct Harness {
        backend: MemoryBackend,
        clock: Arc<ManualClock>,
        manager: TokenLifecycleManager,
    }

    fn harness_with(client: Arc<dyn AuthClient>) -> Harness {
        let backend = MemoryBackend::new();
        let clock = Arc::new(ManualClock::new(T0));
        let manager = TokenLifecycleManager::new(
            Arc::new(EntrySessionStore::new(backend.clone())),
            client,
            clock.clone(),
        );
        Harness {
            backend,
            clock,
            manager,
        }
    }

    fn demo_harness() -> Harness {
        harness_with(Arc::new(DemoAuthClient::new()))
    }

    #[test]
    fn test_is_valid_false_on_empty_store() {
        let h = demo_harness();
        for now in [i64::MIN, -1, 0, T0, i64::MAX] {
            assert!(!h.manager.is_valid(now));
        }
    }

    #[tokio::test]
    async fn test_is_valid_boundary() {
        let h = demo_harness();
        let session = h.manager.login(DEMO_USERNAME, DEMO_PASSWORD).await.unwrap();

        assert!(h.manager.is_valid(session.expires_at - 1));
        assert!(!h.manager.is_valid(session.expires_at));
        assert!(!h.manager.is_valid(session.expires_at + 1));
    }

    #[tokio::test]
    async fn test_login_stores_expiry_from_fixed_clock() {
        let h = demo_harness();
        let session = h.manager.login(DEMO_USERNAME, DEMO_PASSWORD).await.unwrap();

        assert_eq!(session.expires_at, T0 + 3_600_000);
        assert_eq!(
            h.backend.get(TOKEN_EXPIRY_KEY).unwrap(),
            Some((T0 + 3_600_000).to_string())
        );
        assert!(h.manager.is_valid_now());
    }

    #[tokio::test]
    async fn test_login_returns_full_profile_in_memory() {
        let h = demo_harness();
        let session = h.manager.login(DEMO_USERNAME, DEMO_PASSWORD).await.unwrap();

        assert!(session.profile.has_role("admin"));
        assert_eq!(h.manager.current_session(), Some(session));
    }

    #[tokio::test]
    async fn test_bad_credentials_leave_store_untouched() {
        let h = demo_harness();
        let err = h.manager.login("bad", "bad").await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials(_)));
        assert_eq!(err.to_string(), "Invalid email or password");
        assert!(h.backend.is_empty());
        assert_eq!(h.manager.current_session(), None);
    }

    #[tokio::test]
    async fn test_bad_credentials_keep_existing_session() {
        let h = demo_harness();
        h.manager.login(DEMO_USERNAME, DEMO_PASSWORD).await.unwrap();
        let before = h.manager.stored_session();

        h.manager.login(DEMO_USERNAME, "wrong").await.unwrap_err();
        assert_eq!(h.manager.stored_session(), before);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let h = demo_harness();
        h.manager.login(DEMO_USERNAME, DEMO_PASSWORD).await.unwrap();

        h.manager.logout();

        for now in [T0 - 1, T0, T0 + 1] {
            assert!(!h.manager.is_valid(now));
        }
        for key in SESSION_KEYS {
            assert_eq!(h.backend.get(key).unwrap(), None);
        }
        assert_eq!(h.manager.current_session(), None);
    }

    #[test]
    fn test_logout_swallows_storage_failure() {
        let h = demo_harness();
        h.backend.set_available(false);
        h.manager.logout();
    }

    #[tokio::test]
    async fn test_unavailable_storage_reads_as_signed_out() {
        let h = demo_harness();
        h.manager.login(DEMO_USERNAME, DEMO_PASSWORD).await.unwrap();

        h.backend.set_available(false);
        assert!(!h.manager.is_valid_now());
        assert_eq!(h.manager.access_token(), None);
    }

    #[tokio::test]
    async fn test_refresh_without_session_makes_no_network_call() {
        let client = Arc::new(MockAuthClient::new());
        let h = harness_with(client.clone());

        let err = h.manager.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken(_)));
        assert_eq!(client.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_replaces_token_and_expiry() {
        let client = Arc::new(MockAuthClient::new());
        let h = harness_with(client.clone());
        h.manager.login("user", "pw").await.unwrap();

        h.clock.advance(60_000);
        let refreshed = h.manager.refresh().await.unwrap();

        assert_eq!(refreshed.access_token, "mock-access-2");
        assert_eq!(refreshed.refresh_token, "mock-refresh");
        assert_eq!(refreshed.expires_at, T0 + 60_000 + 1_800_000);
        assert!(refreshed.profile.has_role("admin"));

        let stored = h.manager.stored_session().unwrap();
        assert_eq!(stored.access_token, "mock-access-2");
        assert_eq!(stored.expires_at, refreshed.expires_at);
    }

    #[tokio::test]
    async fn test_refresh_adopts_rotated_refresh_token() {
        let client = Arc::new(MockAuthClient::new());
        client.set_refresh(Ok(RefreshResponse {
            access_token: "a3".to_string(),
            refresh_token: Some("rotated".to_string()),
            ttl_seconds: 60,
        }));
        let h = harness_with(client.clone());
        h.manager.login("user", "pw").await.unwrap();

        h.manager.refresh().await.unwrap();
        assert_eq!(h.manager.stored_session().unwrap().refresh_token, "rotated");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_session() {
        let client = Arc::new(MockAuthClient::new());
        client.set_refresh(Err(AuthError::InvalidRefreshToken(
            "Invalid refresh token".to_string(),
        )));
        let h = harness_with(client.clone());
        h.manager.login("user", "pw").await.unwrap();
        let before = h.manager.stored_session();

        h.clock.advance(2 * 3_600_000);
        let err = h.manager.refresh().await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidRefreshToken(_)));
        assert_eq!(h.manager.stored_session(), before);
        assert!(!h.manager.is_valid_now());
    }

    #[tokio::test]
    async fn test_network_error_surfaces_verbatim() {
        let client = Arc::new(MockAuthClient::new());
        client.set_login(Err(AuthError::NetworkError("connection reset".to_string())));
        let h = harness_with(client);

        let err = h.manager.login("user", "pw").await.unwrap_err();
        assert_eq!(err, AuthError::NetworkError("connection reset".to_string()));
        assert!(h.backend.is_empty());
    }

    #[tokio::test]
    async fn test_login_survives_storage_failure_in_memory_only() {
        let h = demo_harness();
        h.backend.set_available(false);

        let session = h.manager.login(DEMO_USERNAME, DEMO_PASSWORD).await.unwrap();
        assert_eq!(h.manager.current_session(), Some(session));
        assert!(!h.manager.is_valid_now());
    }

    #[tokio::test]
    async fn test_authenticate_writes_nothing_until_established() {
        let h = demo_harness();
        let session = h
            .manager
            .authenticate(DEMO_USERNAME, DEMO_PASSWORD)
            .await
            .unwrap();
        assert!(h.backend.is_empty());
        assert_eq!(h.manager.current_session(), None);

        h.manager.establish(&session).unwrap();
        assert!(h.manager.is_valid_now());
        assert_eq!(h.manager.current_session(), Some(session));
    }

    #[tokio::test]
    async fn test_establish_reports_storage_failure() {
        let h = demo_harness();
        let session = h
            .manager
            .authenticate(DEMO_USERNAME, DEMO_PASSWORD)
            .await
            .unwrap();
        h.backend.set_available(false);

        assert!(matches!(
            h.manager.establish(&session),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_restart_recovers_only_projection() {
        let h = demo_harness();
        h.manager.login(DEMO_USERNAME, DEMO_PASSWORD).await.unwrap();

        // A fresh manager over the same storage models a process restart
        let restarted = TokenLifecycleManager::new(
            Arc::new(EntrySessionStore::new(h.backend.clone())),
            Arc::new(DemoAuthClient::new()),
            h.clock.clone(),
        );

        assert!(restarted.is_valid_now());
        assert_eq!(restarted.current_session(), None);
        let profile = restarted.stored_profile().unwrap();
        assert_eq!(profile.username, "admin");
        assert_eq!(profile.profile_picture_url, "/assets/profile-default.png");

        // After a refresh the rebuilt profile has no roles
        let refreshed = restarted.refresh().await.unwrap();
        assert!(refreshed.profile.roles.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_profile_updates_live_session() {
        let client = Arc::new(MockAuthClient::new());
        let h = harness_with(client);

        assert_eq!(
            h.manager.fetch_profile().await.unwrap_err(),
            AuthError::Unauthenticated
        );

        h.manager.login("user", "pw").await.unwrap();
        let profile = h.manager.fetch_profile().await.unwrap();
        assert!(profile.has_role("auditor"));
        assert!(h
            .manager
            .current_session()
            .unwrap()
            .profile
            .has_role("auditor"));
    }
}
