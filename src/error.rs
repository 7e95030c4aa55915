use std::error::Error;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    // Credential errors
    InvalidCredentials,
    AccountLocked(DateTime<Utc>),
    EmailNotVerified,

    // Account errors
    UserAlreadyExists,
    UserNotFound,

    // Token errors
    TokenInvalid,
    TokenExpired,

    // Request errors
    ValidationFailed(String),
    RateLimitExceeded,

    // Authorization errors
    InsufficientPermissions,

    // Configuration errors
    ConfigError(String),

    // Collaborator failures (store, cache, email) surfaced as retryable
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable code for the wire payload
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountLocked(_) => "ACCOUNT_LOCKED",
            Self::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            Self::UserAlreadyExists => "USER_EXISTS",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the boundary layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidCredentials => 401,
            Self::AccountLocked(_) => 423,
            Self::EmailNotVerified => 403,
            Self::UserAlreadyExists => 409,
            Self::UserNotFound => 404,
            Self::TokenInvalid | Self::TokenExpired => 401,
            Self::ValidationFailed(_) => 400,
            Self::RateLimitExceeded => 429,
            Self::InsufficientPermissions => 403,
            Self::ConfigError(_) | Self::Internal(_) => 500,
        }
    }

    /// User-facing error payload. Internal detail never leaks here.
    pub fn to_body(&self) -> ErrorBody {
        let details = match self {
            Self::AccountLocked(until) => Some(serde_json::json!({ "locked_until": until })),
            Self::ValidationFailed(msg) => Some(serde_json::json!({ "error": msg })),
            _ => None,
        };
        ErrorBody {
            code: self.code().to_string(),
            message: self.public_message().to_string(),
            details,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid credentials",
            Self::AccountLocked(_) => "Account locked due to too many failed attempts",
            Self::EmailNotVerified => "Email not verified",
            Self::UserAlreadyExists => "User already exists",
            Self::UserNotFound => "User not found",
            Self::TokenInvalid => "Invalid token",
            Self::TokenExpired => "Token expired",
            Self::ValidationFailed(_) => "Validation failed",
            Self::RateLimitExceeded => "Too many requests",
            Self::InsufficientPermissions => "Insufficient permissions",
            Self::ConfigError(_) => "Service misconfigured",
            Self::Internal(_) => "Internal error, please retry",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid credentials"),
            Self::AccountLocked(until) => write!(f, "account locked until {}", until),
            Self::EmailNotVerified => write!(f, "email not verified"),
            Self::UserAlreadyExists => write!(f, "user already exists"),
            Self::UserNotFound => write!(f, "user not found"),
            Self::TokenInvalid => write!(f, "token invalid"),
            Self::TokenExpired => write!(f, "token expired"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::RateLimitExceeded => write!(f, "rate limit exceeded"),
            Self::InsufficientPermissions => write!(f, "insufficient permissions"),
            Self::ConfigError(msg) => write!(f, "configuration error: {}", msg),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl Error for AuthError {}

/// Wire shape of an error response: `{code, message, details?}`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

// Generic result type for authgate
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::InvalidCredentials.status_code(), 401);
        assert_eq!(AuthError::AccountLocked(Utc::now()).status_code(), 423);
        assert_eq!(AuthError::EmailNotVerified.status_code(), 403);
        assert_eq!(AuthError::UserAlreadyExists.status_code(), 409);
        assert_eq!(AuthError::TokenInvalid.status_code(), 401);
        assert_eq!(AuthError::TokenExpired.status_code(), 401);
        assert_eq!(AuthError::ValidationFailed("x".into()).status_code(), 400);
        assert_eq!(AuthError::RateLimitExceeded.status_code(), 429);
        assert_eq!(AuthError::InsufficientPermissions.status_code(), 403);
        assert_eq!(AuthError::Internal("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_body_never_leaks_internal_detail() {
        let body = AuthError::Internal("pg pool exhausted at 10.0.0.3".into()).to_body();
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert!(!body.message.contains("10.0.0.3"));
        assert!(body.details.is_none());
    }

    #[test]
    fn test_locked_body_carries_until() {
        let until = Utc::now();
        let body = AuthError::AccountLocked(until).to_body();
        assert_eq!(body.code, "ACCOUNT_LOCKED");
        assert!(body.details.is_some());
    }
}
