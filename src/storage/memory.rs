//! In-memory collaborator implementations for development and testing
//!
//! Each mutating operation runs inside a single write-lock critical section,
//! which gives the atomicity the traits promise (duplicate-checked insert,
//! counter-and-lock transition, consume-and-delete).

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::traits::{CredentialStore, EmailDispatcher, LockoutStatus, NewAccount, TokenCache};
use crate::auth::account::{permissions, roles, Account};
use crate::error::{AuthError, Result};

fn chrono_ttl(ttl: Duration) -> ChronoDuration {
    ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::days(36500))
}

struct CredentialState {
    accounts: HashMap<Uuid, Account>,
    email_index: HashMap<String, Uuid>,
    /// role name -> permission names
    role_permissions: HashMap<String, Vec<String>>,
}

/// In-memory credential store seeded with the default role set
pub struct MemoryCredentialStore {
    state: Arc<RwLock<CredentialState>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        let mut role_permissions = HashMap::new();
        role_permissions.insert(
            roles::USER.to_string(),
            vec![permissions::USERS_READ.to_string()],
        );
        role_permissions.insert(
            roles::MODERATOR.to_string(),
            vec![
                permissions::USERS_READ.to_string(),
                permissions::CONTENT_MODERATE.to_string(),
            ],
        );
        role_permissions.insert(
            roles::ADMIN.to_string(),
            vec![
                permissions::USERS_READ.to_string(),
                permissions::USERS_WRITE.to_string(),
                permissions::USERS_DELETE.to_string(),
                permissions::ADMIN_ACCESS.to_string(),
                permissions::CONTENT_MODERATE.to_string(),
            ],
        );

        Self {
            state: Arc::new(RwLock::new(CredentialState {
                accounts: HashMap::new(),
                email_index: HashMap::new(),
                role_permissions,
            })),
        }
    }

    /// Register or replace a role definition (test/bootstrap helper)
    pub async fn define_role(&self, name: &str, permission_names: Vec<String>) {
        let mut state = self.state.write().await;
        state.role_permissions.insert(name.to_string(), permission_names);
    }

    /// Assign an additional role to an existing account (test/bootstrap helper)
    pub async fn assign_role(&self, account_id: Uuid, role: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or(AuthError::UserNotFound)?;
        if !account.roles.iter().any(|r| r == role) {
            account.roles.push(role.to_string());
            account.updated_at = Utc::now();
        }
        Ok(())
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .email_index
            .get(email)
            .and_then(|id| state.accounts.get(id))
            .cloned())
    }

    async fn get_account_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&id).cloned())
    }

    async fn create_account(&self, new: NewAccount) -> Result<Account> {
        let mut state = self.state.write().await;
        if state.email_index.contains_key(&new.email) {
            return Err(AuthError::UserAlreadyExists);
        }
        let account = Account::new(new.email.clone(), new.password_hash, new.roles);
        state.email_index.insert(new.email, account.id);
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn record_login_failure(
        &self,
        id: Uuid,
        max_attempts: u32,
        lock_duration: Duration,
    ) -> Result<LockoutStatus> {
        let mut state = self.state.write().await;
        let account = state.accounts.get_mut(&id).ok_or(AuthError::UserNotFound)?;
        account.failed_attempts += 1;
        if account.failed_attempts >= max_attempts {
            account.locked_until = Some(Utc::now() + chrono_ttl(lock_duration));
        }
        account.updated_at = Utc::now();
        Ok(LockoutStatus {
            failed_attempts: account.failed_attempts,
            locked_until: account.locked_until,
        })
    }

    async fn clear_failed_attempts(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state.accounts.get_mut(&id).ok_or(AuthError::UserNotFound)?;
        account.failed_attempts = 0;
        account.locked_until = None;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state.accounts.get_mut(&id).ok_or(AuthError::UserNotFound)?;
        account.password_hash = hash.to_string();
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn set_email_verified(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state.accounts.get_mut(&id).ok_or(AuthError::UserNotFound)?;
        account.email_verified = true;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn roles_and_permissions(&self, id: Uuid) -> Result<(Vec<String>, Vec<String>)> {
        let state = self.state.read().await;
        let account = state.accounts.get(&id).ok_or(AuthError::UserNotFound)?;

        let mut perms: Vec<String> = Vec::new();
        for role in &account.roles {
            if let Some(role_perms) = state.role_permissions.get(role) {
                for p in role_perms {
                    if !perms.contains(p) {
                        perms.push(p.clone());
                    }
                }
            }
        }
        Ok((account.roles.clone(), perms))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// In-memory token cache
pub struct MemoryTokenCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Utc::now() + chrono_ttl(ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn get_and_delete(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.write().await;
        match entries.remove(key) {
            Some(entry) if entry.expired() => Ok(None),
            Some(entry) => Ok(Some(entry.value)),
            None => Ok(None),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str, window: Duration) -> Result<u64> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if !entry.expired() => {
                let count: u64 = entry.value.parse().unwrap_or(0) + 1;
                entry.value = count.to_string();
                Ok(count)
            }
            _ => {
                entries.insert(
                    key.to_string(),
                    CacheEntry {
                        value: "1".to_string(),
                        expires_at: Utc::now() + chrono_ttl(window),
                    },
                );
                Ok(1)
            }
        }
    }
}

/// A sent message captured by the in-memory dispatcher
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub template: String,
    pub data: serde_json::Value,
}

/// In-memory email dispatcher. Captures outbound messages so tests can read
/// one-time tokens back out; can be switched to a failing mode to exercise
/// degraded delivery.
pub struct MemoryEmailDispatcher {
    sent: Arc<RwLock<Vec<SentEmail>>>,
    failing: AtomicBool,
}

impl MemoryEmailDispatcher {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(RwLock::new(Vec::new())),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.read().await.clone()
    }

    pub async fn last(&self) -> Option<SentEmail> {
        self.sent.read().await.last().cloned()
    }
}

impl Default for MemoryEmailDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailDispatcher for MemoryEmailDispatcher {
    async fn send(&self, to: &str, template: &str, data: &serde_json::Value) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::Internal("smtp unavailable".to_string()));
        }
        self.sent.write().await.push(SentEmail {
            to: to.to_string(),
            template: template.to_string(),
            data: data.clone(),
        });
        Ok(())
    }
}
