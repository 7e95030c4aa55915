//! Failed-login tracking and temporary account lockout
//!
//! The counter and the lock transition live in the credential store, where
//! they are updated in a single atomic write. This module owns the policy:
//! when to lock, for how long, and when an elapsed lock opens again.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;
use crate::security_logger::{log_security_event, RequestContext, SecurityEvent};
use crate::storage::traits::{CredentialStore, LockoutStatus};

pub struct LockoutPolicy {
    store: Arc<dyn CredentialStore>,
    max_attempts: u32,
    lockout_duration: Duration,
}

impl LockoutPolicy {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        max_attempts: u32,
        lockout_duration: Duration,
    ) -> Self {
        Self {
            store,
            max_attempts,
            lockout_duration,
        }
    }

    /// Record a failed login attempt. Crossing the threshold locks the
    /// account and emits a security event.
    pub async fn record_failure(&self, ctx: &RequestContext, id: Uuid) -> Result<LockoutStatus> {
        let status = self
            .store
            .record_login_failure(id, self.max_attempts, self.lockout_duration)
            .await?;

        if let Some(until) = status.locked_until {
            log_security_event(SecurityEvent::AccountLocked {
                account_id: id,
                until,
                correlation_id: ctx.correlation_id.clone(),
            })
            .await;
        }
        Ok(status)
    }

    /// A successful login resets the failure counter
    pub async fn record_success(&self, id: Uuid) -> Result<()> {
        self.store.clear_failed_attempts(id).await
    }

    /// Returns the lock expiry while the account is locked. An elapsed lock
    /// is cleared on sight so the account opens with a fresh counter.
    pub async fn check_locked(
        &self,
        id: Uuid,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<Option<DateTime<Utc>>> {
        match locked_until {
            Some(until) if until > Utc::now() => Ok(Some(until)),
            Some(_) => {
                self.store.clear_failed_attempts(id).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
