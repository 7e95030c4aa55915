//! Engine configuration
//! Loaded from the environment once at startup, validated, then treated as
//! immutable. Every component receives it by reference at construction; no
//! business logic reads the environment directly.

use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_ACCESS_TOKEN_TTL, DEFAULT_EMAIL_VERIFY_TTL, DEFAULT_EXTERNAL_CALL_TIMEOUT,
    DEFAULT_HASH_COST, DEFAULT_LOCKOUT_DURATION, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_MAX_FAILED_ATTEMPTS, DEFAULT_PASSWORD_RESET_TTL, DEFAULT_RATE_LIMIT_REQUESTS,
    DEFAULT_RATE_LIMIT_WINDOW, DEFAULT_REFRESH_TOKEN_TTL, MAX_HASH_COST, MIN_HASH_COST,
    MIN_SECRET_LENGTH,
};
use crate::error::{AuthError, Result};

/// Authentication engine configuration parameters
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret for access-token signing/validation
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub email_verify_ttl: Duration,
    pub password_reset_ttl: Duration,
    /// Password hashing work factor, clamped to [MIN_HASH_COST, MAX_HASH_COST]
    pub hash_cost: u32,
    /// Failed logins before the account locks
    pub max_failed_attempts: u32,
    pub lockout_duration: Duration,
    /// Require letters and digits in passwords
    pub password_complexity: bool,
    /// Requests allowed per client per window
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    /// Hard cap on request payload size
    pub max_body_bytes: usize,
    /// Deadline for any single collaborator call (store, cache, email)
    pub external_call_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        panic!("AuthConfig::default() is not allowed for security reasons. Use AuthConfig::from_env() instead.");
    }
}

impl AuthConfig {
    /// Create a test configuration - DANGEROUS: Only for testing!
    pub fn for_testing() -> Self {
        Self {
            jwt_secret: "unit-test-signing-key-86420-not-for-production".to_string(),
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL,
            email_verify_ttl: DEFAULT_EMAIL_VERIFY_TTL,
            password_reset_ttl: DEFAULT_PASSWORD_RESET_TTL,
            hash_cost: MIN_HASH_COST,
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout_duration: DEFAULT_LOCKOUT_DURATION,
            password_complexity: false,
            rate_limit_requests: DEFAULT_RATE_LIMIT_REQUESTS,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            external_call_timeout: DEFAULT_EXTERNAL_CALL_TIMEOUT,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("AUTHGATE_JWT_SECRET")
            .or_else(|_| env::var("JWT_SECRET"))
            .map_err(|_| {
                AuthError::ConfigError(
                    "JWT_SECRET environment variable is required. \
                     Generate one with: openssl rand -base64 32"
                        .to_string(),
                )
            })?;

        let config = Self {
            jwt_secret,
            access_token_ttl: env_duration_secs("AUTHGATE_ACCESS_TTL_SECS", DEFAULT_ACCESS_TOKEN_TTL),
            refresh_token_ttl: env_duration_secs("AUTHGATE_REFRESH_TTL_SECS", DEFAULT_REFRESH_TOKEN_TTL),
            email_verify_ttl: env_duration_secs("AUTHGATE_EMAIL_VERIFY_TTL_SECS", DEFAULT_EMAIL_VERIFY_TTL),
            password_reset_ttl: env_duration_secs("AUTHGATE_PASSWORD_RESET_TTL_SECS", DEFAULT_PASSWORD_RESET_TTL),
            hash_cost: env_parse("AUTHGATE_HASH_COST", DEFAULT_HASH_COST),
            max_failed_attempts: env_parse("AUTHGATE_MAX_FAILED_ATTEMPTS", DEFAULT_MAX_FAILED_ATTEMPTS),
            lockout_duration: env_duration_secs("AUTHGATE_LOCKOUT_DURATION_SECS", DEFAULT_LOCKOUT_DURATION),
            password_complexity: env_bool("AUTHGATE_PASSWORD_COMPLEXITY", true),
            rate_limit_requests: env_parse("AUTHGATE_RATE_LIMIT_REQUESTS", DEFAULT_RATE_LIMIT_REQUESTS),
            rate_limit_window: env_duration_secs("AUTHGATE_RATE_LIMIT_WINDOW_SECS", DEFAULT_RATE_LIMIT_WINDOW),
            max_body_bytes: env_parse("AUTHGATE_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
            external_call_timeout: env_duration_secs("AUTHGATE_EXTERNAL_TIMEOUT_SECS", DEFAULT_EXTERNAL_CALL_TIMEOUT),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration; called at startup so a bad deployment
    /// fails fast instead of weakening at runtime.
    pub fn validate(&self) -> Result<()> {
        Self::validate_secret(&self.jwt_secret)?;

        if self.hash_cost < MIN_HASH_COST || self.hash_cost > MAX_HASH_COST {
            return Err(AuthError::ConfigError(format!(
                "hash cost {} outside safe range [{}, {}]",
                self.hash_cost, MIN_HASH_COST, MAX_HASH_COST
            )));
        }

        if self.max_failed_attempts == 0 {
            return Err(AuthError::ConfigError(
                "max failed attempts must be positive".to_string(),
            ));
        }

        if self.rate_limit_requests == 0 {
            return Err(AuthError::ConfigError(
                "rate limit request count must be positive".to_string(),
            ));
        }

        if self.access_token_ttl >= self.refresh_token_ttl {
            return Err(AuthError::ConfigError(
                "access token TTL must be shorter than refresh token TTL".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_secret(secret: &str) -> Result<()> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(AuthError::ConfigError(format!(
                "JWT secret must be at least {} characters long",
                MIN_SECRET_LENGTH
            )));
        }

        // Check for insecure default or example values
        let insecure_patterns = [
            "your-secret-key",
            "change-this",
            "test-secret",
            "default",
            "secret",
            "password",
            "12345",
        ];
        for pattern in &insecure_patterns {
            if secret.contains(pattern) {
                return Err(AuthError::ConfigError(format!(
                    "JWT secret contains insecure pattern '{}'. \
                     Use a secure random secret generated with: openssl rand -base64 32",
                    pattern
                )));
            }
        }

        if secret.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AuthError::ConfigError(
                "JWT secret should mix letters, numbers and symbols".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_duration_secs(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "AuthConfig::default() is not allowed for security reasons")]
    fn test_default_panics() {
        let _ = AuthConfig::default();
    }

    #[test]
    fn test_for_testing_validates() {
        let config = AuthConfig::for_testing();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_cost_outside_safe_range() {
        let mut config = AuthConfig::for_testing();
        config.hash_cost = 9;
        assert!(config.validate().is_err());
        config.hash_cost = 15;
        assert!(config.validate().is_err());
        config.hash_cost = 14;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_short_secret() {
        let mut config = AuthConfig::for_testing();
        config.jwt_secret = "short-1".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_secret_embedding_a_digit_run() {
        // "12345" inside a longer run like "0123456789" still matches
        let mut config = AuthConfig::for_testing();
        config.jwt_secret = "signing-key-0123456789-padded-to-length".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_insecure_secret_pattern() {
        let mut config = AuthConfig::for_testing();
        config.jwt_secret = "your-secret-key-padded-to-32-characters-000".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_access_ttl_above_refresh_ttl() {
        let mut config = AuthConfig::for_testing();
        config.access_token_ttl = Duration::from_secs(10);
        config.refresh_token_ttl = Duration::from_secs(5);
        assert!(config.validate().is_err());
    }
}
