use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identity metadata issued with a login.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Profile {
    pub username: String,
    #[serde(rename = "fullName", default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "profilePicture", default)]
    pub profile_picture_url: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Profile {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// The authoritative authentication record held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Session {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    /// Epoch milliseconds after which `access_token` is no longer valid
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
    pub profile: Profile,
}

/// Absolute expiry for a token issued at `now` with the given TTL.
pub fn expiry_from(now: i64, ttl_seconds: u64) -> i64 {
    let ttl_millis = i64::try_from(ttl_seconds)
        .unwrap_or(i64::MAX)
        .saturating_mul(1000);
    now.saturating_add(ttl_millis)
}

impl Session {
    /// Build a session from a login or refresh event. This is the only place
    /// an expiry is computed.
    pub fn issue(
        access_token: String,
        refresh_token: String,
        ttl_seconds: u64,
        profile: Profile,
        now: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: expiry_from(now, ttl_seconds),
            profile,
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at)
    }
}

/// The durable subset of `Profile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct StoredProfile {
    pub username: String,
    #[serde(rename = "profilePicture")]
    pub profile_picture_url: String,
}

impl From<&Profile> for StoredProfile {
    fn from(profile: &Profile) -> Self {
        Self {
            username: profile.username.clone(),
            profile_picture_url: profile.profile_picture_url.clone(),
        }
    }
}

impl From<StoredProfile> for Profile {
    /// Fields that were never persisted come back empty.
    fn from(stored: StoredProfile) -> Self {
        Self {
            username: stored.username,
            profile_picture_url: stored.profile_picture_url,
            ..Default::default()
        }
    }
}

/// What survives a restart: tokens, expiry and the profile projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub profile: StoredProfile,
}

impl StoredSession {
    pub fn is_valid_at(&self, now: i64) -> bool {
        now < self.expires_at
    }

    pub fn time_until_expiry(&self, now: i64) -> Duration {
        Duration::milliseconds(self.expires_at.saturating_sub(now))
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, now: i64) -> i64 {
        self.time_until_expiry(now).num_minutes().max(0)
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at)
    }
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            expires_at: stored.expires_at,
            profile: stored.profile.into(),
        }
    }
}
