//! Middleware and extractors for the HTTP API.

pub mod auth;
pub mod cors;
pub mod rate_limit;

pub use auth::{bearer_token, AuthUser, OptionalBearer};
pub use cors::create_cors_layer;
pub use rate_limit::{client_ip, login_rate_limit, RateLimitState};
