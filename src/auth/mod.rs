//! Authentication for filedock.
//!
//! Password hashing, time-boxed sessions issued against configured
//! credentials, and the expiry countdown clients run against them.

mod countdown;
mod password;
mod session;

pub use countdown::{
    format_remaining, run_countdown, CountdownEvent, CountdownTick, SessionCountdown,
    FIVE_MINUTE_WARNING_MS, ONE_MINUTE_WARNING_MS, TICK_INTERVAL, WARNING_WINDOW_MS,
};
pub use password::{hash_password, verify_password, PasswordError, MAX_PASSWORD_LENGTH};
pub use session::{
    AuthSession, Credential, LimitResult, LoginLimiter, PendingLogin, SessionError, SessionManager,
    LOCKOUT_DURATION_SECS, MAX_LOGIN_ATTEMPTS,
};
