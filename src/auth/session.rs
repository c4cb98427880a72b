//! Time-boxed login sessions and login attempt limiting.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::verify_password;
use crate::config::{AuthConfig, UserEntry};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account locked for {0} seconds")]
    AccountLocked(u64),

    #[error("session expired")]
    SessionExpired,

    #[error("session not found")]
    SessionNotFound,

    #[error("login failed: {0}")]
    Internal(String),
}

/// Failed attempts allowed before an account is locked.
pub const MAX_LOGIN_ATTEMPTS: u32 = 3;

/// Lockout duration (5 minutes).
pub const LOCKOUT_DURATION_SECS: u64 = 5 * 60;

/// A configured login.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: i64,
    pub username: String,
    password_hash: String,
}

impl Credential {
    pub fn new(id: i64, username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            password_hash: password_hash.into(),
        }
    }

    /// Build credentials from config; missing ids are numbered from 1.
    pub fn from_entries(entries: &[UserEntry]) -> Vec<Self> {
        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                Self::new(
                    entry.id.unwrap_or(i as i64 + 1),
                    entry.username.clone(),
                    entry.password_hash.clone(),
                )
            })
            .collect()
    }
}

/// A logged-in session with an absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    /// Opaque bearer token (UUID v4).
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn with_duration(user_id: i64, username: impl Into<String>, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            token: Uuid::new_v4().to_string(),
            user_id,
            username: username.into(),
            created_at: now,
            expires_at: now + chrono::Duration::from_std(duration).unwrap_or_default(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Milliseconds until expiry, never negative.
    pub fn remaining_ms_at(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_milliseconds().max(0)
    }

    pub fn remaining_ms(&self) -> i64 {
        self.remaining_ms_at(Utc::now())
    }
}

/// A login that passed the lockout check and named a known user, waiting
/// for its password to be verified.
#[derive(Debug)]
pub struct PendingLogin {
    username: String,
    credential: Credential,
}

impl PendingLogin {
    /// Verify the password against the stored argon2 hash. CPU-bound.
    pub fn verify(&self, password: &str) -> bool {
        verify_password(password, &self.credential.password_hash).is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitResult {
    Allowed,
    Locked(Duration),
}

/// Failed login tracking per username (case-insensitive).
#[derive(Debug)]
pub struct LoginLimiter {
    failures: HashMap<String, Vec<Instant>>,
    max_attempts: u32,
    lockout: Duration,
}

impl Default for LoginLimiter {
    fn default() -> Self {
        Self::new(MAX_LOGIN_ATTEMPTS, Duration::from_secs(LOCKOUT_DURATION_SECS))
    }
}

impl LoginLimiter {
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            failures: HashMap::new(),
            max_attempts,
            lockout,
        }
    }

    pub fn check(&mut self, username: &str) -> LimitResult {
        let now = Instant::now();
        let Some(failures) = self.failures.get_mut(&username.to_lowercase()) else {
            return LimitResult::Allowed;
        };
        failures.retain(|t| now.duration_since(*t) < self.lockout);

        if failures.len() >= self.max_attempts as usize {
            if let Some(oldest) = failures.first() {
                return LimitResult::Locked(self.lockout - now.duration_since(*oldest));
            }
        }
        LimitResult::Allowed
    }

    pub fn record_failure(&mut self, username: &str) {
        let failures = self.failures.entry(username.to_lowercase()).or_default();
        failures.push(Instant::now());
        debug!(username = %username, failures = failures.len(), "Recorded failed login");
    }

    pub fn clear(&mut self, username: &str) {
        self.failures.remove(&username.to_lowercase());
    }

    /// Drop entries whose failures have all aged out.
    pub fn cleanup(&mut self) {
        let now = Instant::now();
        let lockout = self.lockout;
        self.failures.retain(|_, failures| {
            failures.retain(|t| now.duration_since(*t) < lockout);
            !failures.is_empty()
        });
    }
}

/// Active sessions plus the configured credentials they are issued against.
#[derive(Debug)]
pub struct SessionManager {
    credentials: Vec<Credential>,
    sessions: HashMap<String, AuthSession>,
    limiter: LoginLimiter,
    session_duration: Duration,
}

impl SessionManager {
    pub fn new(credentials: Vec<Credential>, session_duration: Duration) -> Self {
        Self {
            credentials,
            sessions: HashMap::new(),
            limiter: LoginLimiter::default(),
            session_duration,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            Credential::from_entries(&config.users),
            Duration::from_secs(config.session_duration_secs),
        )
    }

    pub fn session_duration(&self) -> Duration {
        self.session_duration
    }

    /// Check the lockout and look up the user.
    pub fn begin_login(&mut self, username: &str) -> Result<PendingLogin, SessionError> {
        if let LimitResult::Locked(remaining) = self.limiter.check(username) {
            warn!(username = %username, remaining_secs = remaining.as_secs(), "Login blocked: account locked");
            return Err(SessionError::AccountLocked(remaining.as_secs().max(1)));
        }

        let Some(credential) = self
            .credentials
            .iter()
            .find(|c| c.username == username)
            .cloned()
        else {
            self.limiter.record_failure(username);
            warn!(username = %username, "Login failed: unknown user");
            return Err(SessionError::InvalidCredentials);
        };

        Ok(PendingLogin {
            username: username.to_string(),
            credential,
        })
    }

    /// Record the outcome of a verified or rejected password.
    pub fn finish_login(
        &mut self,
        pending: PendingLogin,
        verified: bool,
    ) -> Result<AuthSession, SessionError> {
        let username = pending.username;
        if !verified {
            self.limiter.record_failure(&username);
            warn!(username = %username, "Login failed: wrong password");
            return Err(SessionError::InvalidCredentials);
        }

        self.limiter.clear(&username);
        let credential = pending.credential;
        let session =
            AuthSession::with_duration(credential.id, credential.username, self.session_duration);
        self.sessions.insert(session.token.clone(), session.clone());

        info!(username = %username, user_id = session.user_id, expires_at = %session.expires_at, "Login successful");
        Ok(session)
    }

    /// Check credentials and open a session, verifying on this thread.
    pub fn login(&mut self, username: &str, password: &str) -> Result<AuthSession, SessionError> {
        let pending = self.begin_login(username)?;
        let verified = pending.verify(password);
        self.finish_login(pending, verified)
    }

    /// Log in against a shared manager.
    ///
    /// The lock is released while the password hash is verified on the
    /// blocking pool, so session lookups are not held up by a login.
    pub async fn login_shared(
        manager: &Mutex<Self>,
        username: &str,
        password: &str,
    ) -> Result<AuthSession, SessionError> {
        let pending = manager.lock().await.begin_login(username)?;

        let password = password.to_string();
        let (pending, verified) = tokio::task::spawn_blocking(move || {
            let verified = pending.verify(&password);
            (pending, verified)
        })
        .await
        .map_err(|e| SessionError::Internal(e.to_string()))?;

        manager.lock().await.finish_login(pending, verified)
    }

    /// End a session. Returns the session if it existed.
    pub fn logout(&mut self, token: &str) -> Option<AuthSession> {
        let session = self.sessions.remove(token);
        match &session {
            Some(s) => info!(user_id = s.user_id, "Session logged out"),
            None => debug!("Logout: session not found"),
        }
        session
    }

    /// Look up a live session; an expired one is removed.
    pub fn get_session(&mut self, token: &str) -> Result<AuthSession, SessionError> {
        let session = self
            .sessions
            .get(token)
            .ok_or(SessionError::SessionNotFound)?;

        if session.is_expired() {
            self.sessions.remove(token);
            return Err(SessionError::SessionExpired);
        }
        Ok(session.clone())
    }

    /// Remove expired sessions and stale limiter entries.
    pub fn cleanup(&mut self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired_at(now));
        self.limiter.cleanup();

        let removed = before - self.sessions.len();
        if removed > 0 {
            debug!(removed, "Cleaned up expired sessions");
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
