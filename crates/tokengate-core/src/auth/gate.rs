//! Process-wide authenticated/anonymous state.
//!
//! ```text
//! Anonymous --login--> Authenticating --ok--> Authenticated
//!                                     --err-> Anonymous
//! Authenticated --logout--> Anonymous
//! ```
//!
//! Only one login request may be in flight per gate, even across a logout.
//! The request runs on its own task: dropping the future returned by `login`
//! does not cancel it, and a late success still persists the session and
//! settles the state. A logout supersedes the pending attempt instead: its
//! answer is discarded when it arrives.
//!
//! Every state change that touches the store happens inside the watch
//! channel's write lock, so a settling login and a logout cannot interleave.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::AuthError;

use super::lifecycle::TokenLifecycleManager;
use super::session::{Session, StoredProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum GateState {
    Anonymous,
    Authenticating,
    Authenticated,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("A login request is already in progress")]
    LoginInProgress,

    #[error("Signed out while the request was in flight")]
    Superseded,

    #[error("Session could not be stored; still signed out")]
    NotPersisted,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

struct Shared {
    manager: Arc<TokenLifecycleManager>,
    state: watch::Sender<GateState>,
    /// Bumped by every login attempt and every logout
    generation: AtomicU64,
    login_in_flight: AtomicBool,
}

impl Shared {
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn settled_state(&self) -> GateState {
        if self.manager.is_valid_now() {
            GateState::Authenticated
        } else {
            GateState::Anonymous
        }
    }

    /// Publish the outcome of login `attempt`, unless a newer action has
    /// taken over the gate since it started.
    fn settle_login(
        &self,
        attempt: u64,
        result: Result<Session, AuthError>,
    ) -> Result<Session, GateError> {
        let mut outcome = Err(GateError::Superseded);
        self.state.send_if_modified(|state| {
            if self.generation() != attempt {
                return false;
            }
            outcome = match result {
                Ok(session) => match self.manager.establish(&session) {
                    Ok(()) => Ok(session),
                    Err(e) => {
                        warn!(error = %e, "Login succeeded but the session was not stored");
                        Err(GateError::NotPersisted)
                    }
                },
                Err(e) => Err(e.into()),
            };
            // A failed re-login leaves an earlier, still-valid session in force
            *state = self.settled_state();
            true
        });
        if matches!(outcome, Err(GateError::Superseded)) {
            info!("Login answered after logout, discarding");
        } else {
            let settled = *self.state.borrow();
            debug!(state = ?settled, "Login settled");
        }
        outcome
    }
}

/// Clears the in-flight flag when the login task ends, panics included.
struct InFlight(Arc<Shared>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.login_in_flight.store(false, Ordering::SeqCst);
    }
}

pub struct SessionGate {
    shared: Arc<Shared>,
}

impl SessionGate {
    /// Start `Anonymous`, then adopt a still-valid stored session without
    /// touching the network.
    pub fn new(manager: Arc<TokenLifecycleManager>) -> Self {
        let (tx, _rx) = watch::channel(GateState::Anonymous);
        let shared = Shared {
            manager,
            state: tx,
            generation: AtomicU64::new(0),
            login_in_flight: AtomicBool::new(false),
        };
        if shared.manager.is_valid_now() {
            shared.state.send_replace(GateState::Authenticated);
            debug!("Restored valid session from store");
        }
        Self {
            shared: Arc::new(shared),
        }
    }

    pub fn state(&self) -> GateState {
        *self.shared.state.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == GateState::Authenticated
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.shared.state.subscribe()
    }

    pub fn manager(&self) -> &Arc<TokenLifecycleManager> {
        &self.shared.manager
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session, GateError> {
        if self
            .shared
            .login_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Login rejected: another login is in flight");
            return Err(GateError::LoginInProgress);
        }
        let guard = InFlight(Arc::clone(&self.shared));

        let mut attempt = 0;
        self.shared.state.send_modify(|state| {
            attempt = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = GateState::Authenticating;
        });
        debug!(attempt, "Gate state -> Authenticating");

        let shared = Arc::clone(&self.shared);
        let username = username.to_string();
        let password = password.to_string();

        let task = tokio::spawn(async move {
            let _guard = guard;
            let result = shared.manager.authenticate(&username, &password).await;
            shared.settle_login(attempt, result)
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                self.shared.state.send_if_modified(|state| {
                    if self.shared.generation() != attempt {
                        return false;
                    }
                    *state = self.shared.settled_state();
                    true
                });
                Err(GateError::Auth(AuthError::NetworkError(format!(
                    "Login task failed: {}",
                    e
                ))))
            }
        }
    }

    /// Synchronous and unconditional. A login still in flight is superseded
    /// but keeps the gate busy until its request settles.
    pub fn logout(&self) {
        self.shared.state.send_modify(|state| {
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            self.shared.manager.logout();
            *state = GateState::Anonymous;
        });
        info!("Gate state -> Anonymous");
    }

    /// Refresh the access token. Failure leaves the state alone; whether to
    /// log out is the caller's decision.
    pub async fn refresh(&self) -> Result<Session, GateError> {
        let started = self.shared.generation();
        let session = self.shared.manager.renew().await?;

        let mut outcome = Err(GateError::Superseded);
        self.shared.state.send_if_modified(|state| {
            if self.shared.generation() != started {
                return false;
            }
            if let Err(e) = self.shared.manager.establish(&session) {
                warn!(error = %e, "Refreshed session was not stored");
                outcome = Err(GateError::NotPersisted);
                return false;
            }
            outcome = Ok(session);
            if *state == GateState::Anonymous {
                *state = GateState::Authenticated;
                return true;
            }
            false
        });
        outcome
    }

    /// Re-check the stored token. An authenticated gate whose token has
    /// expired invalidates the session and drops to `Anonymous`.
    pub fn revalidate(&self) -> GateState {
        self.shared.state.send_if_modified(|state| {
            match (*state, self.shared.manager.is_valid_now()) {
                (GateState::Authenticated, false) => {
                    info!("Stored session expired, invalidating");
                    self.shared.manager.logout();
                    *state = GateState::Anonymous;
                    true
                }
                (GateState::Anonymous, true) => {
                    *state = GateState::Authenticated;
                    true
                }
                _ => false,
            }
        });
        self.state()
    }

    /// Profile for display: the live one if this process logged in,
    /// otherwise the stored projection.
    pub fn display_profile(&self) -> Option<StoredProfile> {
        if !self.is_authenticated() {
            return None;
        }
        let manager = &self.shared.manager;
        manager
            .current_session()
            .map(|s| StoredProfile::from(&s.profile))
            .or_else(|| manager.stored_profile())
    }
}
