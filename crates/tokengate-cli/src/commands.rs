//! Command implementations.
//!
//! Each command builds on one `Context`: the session gate and route guard,
//! wired from configuration.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use chrono::Local;
use tracing::{error, info, warn};

use tokengate_core::api::demo::DEMO_USERNAME;
use tokengate_core::auth::CredentialStore;
use tokengate_core::{
    store, Admission, AuthClient, AuthError, Config, DemoAuthClient, GateError, HttpAuthClient,
    RouteGuard, SessionGate, SystemClock, TokenLifecycleManager,
};

/// Simulated round trip for the demo backend
const DEMO_LATENCY_MS: u64 = 500;

pub struct Context {
    pub config: Config,
    pub gate: Arc<SessionGate>,
    pub guard: RouteGuard,
}

impl Context {
    pub fn build(config: Config) -> Result<Self> {
        let store_dir = config.store_dir()?;
        let store = store::open(config.store, &store_dir, config.store_passphrase.as_deref())
            .context("Failed to open session store")?;

        let client: Arc<dyn AuthClient> = match config.auth_base_url {
            Some(ref url) => Arc::new(
                HttpAuthClient::with_timeout(
                    url.as_str(),
                    Duration::from_secs(config.request_timeout_secs),
                )
                .context("Failed to build HTTP client")?,
            ),
            None => {
                info!("No auth URL configured, using demo backend");
                Arc::new(DemoAuthClient::with_latency(Duration::from_millis(
                    DEMO_LATENCY_MS,
                )))
            }
        };

        let manager = Arc::new(TokenLifecycleManager::new(
            store,
            client,
            Arc::new(SystemClock),
        ));
        let gate = Arc::new(SessionGate::new(manager));
        let guard = RouteGuard::new(Arc::clone(&gate), config.guard.clone());

        Ok(Self {
            config,
            gate,
            guard,
        })
    }
}

pub fn status(ctx: &Context) {
    if !ctx.gate.is_authenticated() {
        println!("Not signed in.");
        return;
    }

    let manager = ctx.gate.manager();
    let username = ctx
        .gate
        .display_profile()
        .map(|p| p.username)
        .unwrap_or_default();
    println!("Signed in as {}", username);

    if let Some(stored) = manager.stored_session() {
        let now = manager.now();
        if let Some(expiry) = stored.expires_at_utc() {
            println!(
                "Token expires {} ({} min remaining)",
                expiry.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                stored.minutes_until_expiry(now)
            );
        }
    }
}

pub async fn login(ctx: &mut Context, username: Option<String>, remember: bool) -> Result<()> {
    let username = match username
        .or_else(|| ctx.config.username.clone())
        .filter(|u| !u.is_empty())
    {
        Some(u) => u,
        None => prompt_username(ctx.config.last_username.as_deref())?,
    };

    let password = match ctx.config.password.clone() {
        Some(p) => p,
        None => match CredentialStore::recall(&username) {
            Ok(Some(p)) => p,
            Ok(None) => rpassword::prompt_password("Password: ")?,
            Err(e) => {
                warn!(error = %e, "Keychain unavailable, prompting for password");
                rpassword::prompt_password("Password: ")?
            }
        },
    };

    if ctx.config.auth_base_url.is_none() {
        println!("(demo backend: sign in as {})", DEMO_USERNAME);
    }
    println!("Authenticating...");

    match ctx.gate.login(&username, &password).await {
        Ok(session) => {
            if remember {
                if let Err(e) = CredentialStore::remember(&username, &password) {
                    warn!(error = %e, "Failed to store credentials");
                }
            }

            ctx.config.last_username = Some(username);
            if let Err(e) = ctx.config.save() {
                warn!(error = %e, "Failed to save config");
            }

            let name = if session.profile.full_name.is_empty() {
                &session.profile.username
            } else {
                &session.profile.full_name
            };
            println!("Login successful! Welcome, {}.", name);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Login failed");
            let message = login_failure_message(&e);
            println!("{}", message);
            Err(anyhow::anyhow!(message))
        }
    }
}

/// User-facing text for a failed login.
pub fn login_failure_message(err: &GateError) -> String {
    match err {
        GateError::Auth(AuthError::InvalidCredentials(msg)) => msg.clone(),
        GateError::Auth(AuthError::NetworkError(_)) => {
            "Unable to connect to server. Check your internet connection.".to_string()
        }
        GateError::LoginInProgress => "A login is already in progress.".to_string(),
        GateError::NotPersisted => {
            "Signed in, but the session could not be saved. Check the session store.".to_string()
        }
        other => format!("Login failed: {}", other),
    }
}

pub fn logout(ctx: &Context, forget: bool) -> Result<()> {
    ctx.gate.logout();

    if forget {
        if let Some(ref username) = ctx.config.last_username {
            CredentialStore::forget(username)?;
        }
    }
    println!("Signed out.");
    Ok(())
}

pub async fn refresh(ctx: &Context) -> Result<()> {
    match ctx.gate.refresh().await {
        Ok(session) => {
            let expiry = session
                .expires_at_utc()
                .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
                .unwrap_or_default();
            println!("Token refreshed; valid until {}.", expiry);
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Refresh failed");
            println!("Refresh failed: {}. Run `tokengate login` to sign in again.", e);
            Err(e.into())
        }
    }
}

pub async fn profile(ctx: &Context) -> Result<()> {
    if ctx.gate.revalidate() != tokengate_core::GateState::Authenticated {
        println!("Not signed in.");
        return Ok(());
    }

    let profile = ctx
        .gate
        .manager()
        .fetch_profile()
        .await
        .context("Failed to fetch profile")?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

pub fn open(ctx: &Context, path: &str) {
    // Navigation re-checks expiry; there is no background timer doing it
    ctx.gate.revalidate();

    match ctx.guard.authorize_path(path) {
        Admission::Admit => println!("admit {}", path),
        Admission::Redirect(to) => println!("redirect {} -> {}", path, to),
    }
}

fn prompt_username(last_username: Option<&str>) -> Result<String> {
    match last_username {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), last_username) {
        (true, Some(last)) => Ok(last.to_string()),
        (true, None) => Err(anyhow::anyhow!("Username required")),
        (false, _) => Ok(input.to_string()),
    }
}
