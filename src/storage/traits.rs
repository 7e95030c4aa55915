//! Collaborator interfaces: relational credential store, key-value token
//! cache and outbound email. The engine owns no mutable state of its own;
//! everything that must survive a request or be shared between workers goes
//! through these traits, and the mutating operations are specified as atomic
//! so concurrent requests for the same account or token cannot interleave.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use crate::auth::account::Account;
use crate::error::Result;

/// Payload for account creation
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Already case-normalized by the engine
    pub email: String,
    pub password_hash: String,
    /// Role names to assign at creation
    pub roles: Vec<String>,
}

/// Outcome of recording a failed login
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockoutStatus {
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Relational store holding accounts, lock state and role assignments
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up an account by its case-normalized email
    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn get_account_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    /// Create an account; fails with `UserAlreadyExists` when the email is
    /// taken. The duplicate check and the insert are one atomic operation.
    async fn create_account(&self, new: NewAccount) -> Result<Account>;

    /// Record a failed login: increment the counter and, when it reaches
    /// `max_attempts`, set `lock_until = now + lock_duration` in the same
    /// write. Single read-modify-write so concurrent failures cannot lose
    /// updates.
    async fn record_login_failure(
        &self,
        id: Uuid,
        max_attempts: u32,
        lock_duration: Duration,
    ) -> Result<LockoutStatus>;

    /// Reset the failure counter and clear any lock
    async fn clear_failed_attempts(&self, id: Uuid) -> Result<()>;

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> Result<()>;

    async fn set_email_verified(&self, id: Uuid) -> Result<()>;

    /// Resolve the account's roles and, transitively, the permissions those
    /// roles grant. Called at token-issue time; the result is baked into the
    /// access token as a snapshot.
    async fn roles_and_permissions(&self, id: Uuid) -> Result<(Vec<String>, Vec<String>)>;
}

/// Key-value cache holding refresh-token records, one-time tokens and
/// rate-limit counters. Shared across process instances.
#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Atomic consume: return the value and delete it in one step. Two
    /// concurrent calls for the same key see exactly one `Some`.
    async fn get_and_delete(&self, key: &str) -> Result<Option<String>>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Increment a fixed-window counter, creating it with the window TTL on
    /// first touch. Returns the post-increment count.
    async fn incr(&self, key: &str, window: Duration) -> Result<u64>;
}

/// Outbound email. Failures are the caller's to log; delivery is
/// fire-and-forget from the engine's perspective.
#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    async fn send(&self, to: &str, template: &str, data: &serde_json::Value) -> Result<()>;
}
