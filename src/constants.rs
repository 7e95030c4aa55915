use std::time::Duration;

// Token lifetimes
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 3600);
pub const DEFAULT_EMAIL_VERIFY_TTL: Duration = Duration::from_secs(24 * 3600);
pub const DEFAULT_PASSWORD_RESET_TTL: Duration = Duration::from_secs(3600);

// Cache entries for opaque tokens outlive the token itself by this grace
// window so an expired token is reported as expired, not merely unknown.
pub const TOKEN_CACHE_GRACE: Duration = Duration::from_secs(24 * 3600);

// Password hashing work factor bounds. Below the floor the hash is too cheap
// to brute-force-resist; above the ceiling verification becomes a CPU
// exhaustion vector.
pub const MIN_HASH_COST: u32 = 10;
pub const MAX_HASH_COST: u32 = 14;
pub const DEFAULT_HASH_COST: u32 = 12;

// Lockout policy defaults
pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(30 * 60);

// Request guard defaults
pub const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 10;
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

// Collaborator calls (store, cache, email) are bounded per request
pub const DEFAULT_EXTERNAL_CALL_TIMEOUT: Duration = Duration::from_secs(30);

// Input validation
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MIN_SECRET_LENGTH: usize = 32;

// Minimum wall time for login/register so failure paths do not leak timing
pub const MIN_AUTH_DURATION: Duration = Duration::from_millis(100);
