//! Authgate - an authentication and authorization engine
//!
//! This library provides the credential lifecycle for a user-facing service:
//! password hashing, access/refresh token issuance and rotation, account
//! lockout, role/permission checks and inbound request screening. Storage,
//! cache and email delivery are pluggable collaborators behind traits.

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod security;
pub mod security_logger;
pub mod storage;

// Re-export main components
pub use config::AuthConfig;
pub use error::{AuthError, Result};
