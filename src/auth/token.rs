//! Token issuance, validation, rotation and revocation
//!
//! Three token families live here:
//!
//! - Access tokens: short-lived signed JWTs. Stateless; validity is proven
//!   by signature and expiry alone, so they cannot be revoked early.
//! - Refresh tokens: long-lived opaque random values held in the token
//!   cache, keyed by digest. Rotation is single-use; presenting a rotated
//!   token again is treated as theft and kills the whole lineage.
//! - One-time tokens: purpose-scoped opaque values (email verification,
//!   password reset) consumed atomically exactly once.
//!
//! A presented token is never stored verbatim: cache keys are SHA-256
//! digests, so a cache dump does not yield usable credentials.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::auth::account::Account;
use crate::constants::TOKEN_CACHE_GRACE;
use crate::error::{AuthError, Result};
use crate::security_logger::{log_security_event, RequestContext, SecurityEvent};
use crate::storage::traits::TokenCache;

/// Access-token claim set: identity plus a snapshot of roles and permissions
/// taken at issue time. The snapshot is not re-evaluated until the next
/// issuance, a staleness window bounded by the access-token TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account id)
    pub sub: Uuid,
    pub email: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    /// Issued at (UTC timestamp)
    pub iat: usize,
    /// Not before (UTC timestamp)
    pub nbf: usize,
    /// Expiration (UTC timestamp)
    pub exp: usize,
    /// Token id, for audit correlation
    pub jti: String,
}

/// Purpose scope for one-time tokens. A token issued for one purpose can
/// never be consumed for another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPurpose {
    VerifyEmail,
    ResetPassword,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::VerifyEmail => "verify-email",
            TokenPurpose::ResetPassword => "reset-password",
        }
    }
}

/// Cache record behind a live refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub account_id: Uuid,
    pub device_id: String,
    /// Chain identity shared by every rotation descended from one issuance
    pub lineage_id: String,
    /// Account token epoch at issuance; records older than the account's
    /// current epoch are dead (password reset bumps the epoch)
    pub epoch: u64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OneTimeRecord {
    account_id: Uuid,
    purpose: TokenPurpose,
    expires_at: DateTime<Utc>,
}

fn refresh_key(digest: &str) -> String {
    format!("auth:refresh:{}", digest)
}

fn rotated_key(digest: &str) -> String {
    format!("auth:refresh:rotated:{}", digest)
}

fn lineage_key(lineage_id: &str) -> String {
    format!("auth:refresh:lineage:{}", lineage_id)
}

fn epoch_key(account_id: Uuid) -> String {
    format!("auth:refresh:epoch:{}", account_id)
}

fn otp_key(purpose: TokenPurpose, digest: &str) -> String {
    format!("auth:otp:{}:{}", purpose.as_str(), digest)
}

/// Generate an opaque token: 32 random bytes, base64url
fn generate_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Digest a presented token for use as a cache key
fn token_digest(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

/// Manages access, refresh and one-time token operations
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    cache: Arc<dyn TokenCache>,
}

impl TokenIssuer {
    pub fn new(
        secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
        cache: Arc<dyn TokenCache>,
    ) -> Self {
        let mut validation = Validation::default();
        // No leeway: an expired token is expired
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
            cache,
        }
    }

    /// Issue a signed access token carrying the account's current
    /// role/permission snapshot
    pub fn issue_access_token(
        &self,
        account: &Account,
        roles: Vec<String>,
        permissions: Vec<String>,
    ) -> Result<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: account.id,
            email: account.email.clone(),
            roles,
            permissions,
            iat: now,
            nbf: now,
            exp: now + self.access_ttl.as_secs() as usize,
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("failed to sign access token: {}", e)))
    }

    /// Validate a presented access token. Stateless: signature + expiry.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })
    }

    /// Issue a fresh refresh token, starting a new lineage for the
    /// (account, device) pair
    pub async fn issue_refresh_token(&self, account_id: Uuid, device_id: &str) -> Result<String> {
        let lineage_id = Uuid::new_v4().to_string();
        let epoch = self.current_epoch(account_id).await?;
        self.store_refresh(account_id, device_id, &lineage_id, epoch)
            .await
    }

    /// Exchange a refresh token for a new one. The presented record is
    /// consumed atomically, so of two concurrent rotations exactly one wins.
    /// A token that was already rotated is a replay: the lineage's live
    /// token is revoked and the call fails.
    pub async fn rotate_refresh_token(
        &self,
        ctx: &RequestContext,
        old_token: &str,
    ) -> Result<(RefreshRecord, String)> {
        let digest = token_digest(old_token);

        let record_json = match self.cache.get_and_delete(&refresh_key(&digest)).await? {
            Some(json) => json,
            None => {
                // Unknown live token. If it was rotated before, this is a
                // replay: kill whatever is currently live in the lineage.
                if let Some(lineage_id) = self.cache.get(&rotated_key(&digest)).await? {
                    self.revoke_lineage(&lineage_id).await?;
                    log_security_event(SecurityEvent::TokenReplayDetected {
                        lineage_id,
                        correlation_id: ctx.correlation_id.clone(),
                    })
                    .await;
                }
                return Err(AuthError::TokenInvalid);
            }
        };

        let record: RefreshRecord = serde_json::from_str(&record_json)
            .map_err(|e| AuthError::Internal(format!("corrupt refresh record: {}", e)))?;

        if record.expires_at <= Utc::now() {
            self.cache.delete(&lineage_key(&record.lineage_id)).await?;
            return Err(AuthError::TokenExpired);
        }

        // Records issued before the account's current epoch were invalidated
        // wholesale (password reset)
        if record.epoch < self.current_epoch(record.account_id).await? {
            self.cache.delete(&lineage_key(&record.lineage_id)).await?;
            return Err(AuthError::TokenInvalid);
        }

        // Tombstone the consumed token for the rest of its natural lifetime
        // so a later replay is distinguishable from garbage
        let remaining = (record.expires_at - Utc::now())
            .to_std()
            .unwrap_or_default();
        self.cache
            .set(
                &rotated_key(&digest),
                &record.lineage_id,
                remaining + TOKEN_CACHE_GRACE,
            )
            .await?;

        let new_token = self
            .store_refresh(
                record.account_id,
                &record.device_id,
                &record.lineage_id,
                record.epoch,
            )
            .await?;

        Ok((record, new_token))
    }

    /// Revoke a refresh token (logout). Idempotent: revoking an unknown or
    /// already-revoked token succeeds.
    pub async fn revoke_refresh_token(&self, token: &str) -> Result<()> {
        let digest = token_digest(token);
        if let Some(json) = self.cache.get_and_delete(&refresh_key(&digest)).await? {
            if let Ok(record) = serde_json::from_str::<RefreshRecord>(&json) {
                self.cache.delete(&lineage_key(&record.lineage_id)).await?;
            }
        }
        Ok(())
    }

    /// Invalidate every outstanding refresh token for an account by bumping
    /// its token epoch. Existing records carry the old epoch and fail
    /// rotation from now on.
    pub async fn revoke_account_tokens(&self, account_id: Uuid) -> Result<()> {
        self.cache
            .incr(
                &epoch_key(account_id),
                self.refresh_ttl + TOKEN_CACHE_GRACE,
            )
            .await?;
        Ok(())
    }

    /// Issue a purpose-scoped, single-use, time-bound opaque token
    pub async fn issue_one_time_token(
        &self,
        account_id: Uuid,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Result<String> {
        let token = generate_opaque_token();
        let record = OneTimeRecord {
            account_id,
            purpose,
            expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default(),
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| AuthError::Internal(format!("failed to encode token record: {}", e)))?;
        // The entry outlives the token by the grace window so consumption
        // after expiry reports TokenExpired instead of TokenInvalid
        self.cache
            .set(
                &otp_key(purpose, &token_digest(&token)),
                &json,
                ttl + TOKEN_CACHE_GRACE,
            )
            .await?;
        Ok(token)
    }

    /// Consume a one-time token: atomic check-and-delete, so concurrent
    /// consumers see exactly one success
    pub async fn consume_one_time_token(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<Uuid> {
        let key = otp_key(purpose, &token_digest(token));
        let json = self
            .cache
            .get_and_delete(&key)
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        let record: OneTimeRecord = serde_json::from_str(&json)
            .map_err(|e| AuthError::Internal(format!("corrupt one-time record: {}", e)))?;
        if record.expires_at <= Utc::now() {
            return Err(AuthError::TokenExpired);
        }
        Ok(record.account_id)
    }

    async fn store_refresh(
        &self,
        account_id: Uuid,
        device_id: &str,
        lineage_id: &str,
        epoch: u64,
    ) -> Result<String> {
        let token = generate_opaque_token();
        let digest = token_digest(&token);
        let now = Utc::now();
        let record = RefreshRecord {
            account_id,
            device_id: device_id.to_string(),
            lineage_id: lineage_id.to_string(),
            epoch,
            issued_at: now,
            expires_at: now
                + chrono::Duration::from_std(self.refresh_ttl).unwrap_or_default(),
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| AuthError::Internal(format!("failed to encode refresh record: {}", e)))?;

        let cache_ttl = self.refresh_ttl + TOKEN_CACHE_GRACE;
        self.cache.set(&refresh_key(&digest), &json, cache_ttl).await?;
        // Track the lineage's live token so a replay can revoke it
        self.cache
            .set(&lineage_key(lineage_id), &digest, cache_ttl)
            .await?;
        Ok(token)
    }

    async fn revoke_lineage(&self, lineage_id: &str) -> Result<()> {
        if let Some(live_digest) = self.cache.get_and_delete(&lineage_key(lineage_id)).await? {
            self.cache.delete(&refresh_key(&live_digest)).await?;
        }
        Ok(())
    }

    async fn current_epoch(&self, account_id: Uuid) -> Result<u64> {
        Ok(self
            .cache
            .get(&epoch_key(account_id))
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::account::Account;
    use crate::storage::memory::MemoryTokenCache;

    const SECRET: &str = "unit-test-signing-key-86420-not-for-production";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            SECRET,
            Duration::from_secs(900),
            Duration::from_secs(7 * 24 * 3600),
            Arc::new(MemoryTokenCache::new()),
        )
    }

    fn account() -> Account {
        Account::new(
            "a@x.com".to_string(),
            "$argon2id$fake".to_string(),
            vec!["user".to_string()],
        )
    }

    #[test]
    fn test_access_token_roundtrip() {
        let issuer = issuer();
        let account = account();
        let token = issuer
            .issue_access_token(
                &account,
                vec!["user".to_string()],
                vec!["users.read".to_string()],
            )
            .unwrap();

        let claims = issuer.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, account.id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.roles, vec!["user"]);
        assert_eq!(claims.permissions, vec!["users.read"]);
    }

    #[test]
    fn test_tampered_access_token_invalid() {
        let issuer = issuer();
        let token = issuer
            .issue_access_token(&account(), vec![], vec![])
            .unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('x');
        assert_eq!(
            issuer.validate_access_token(&tampered).unwrap_err(),
            AuthError::TokenInvalid
        );
        assert_eq!(
            issuer.validate_access_token("garbage").unwrap_err(),
            AuthError::TokenInvalid
        );
    }

    #[test]
    fn test_expired_access_token_reports_expired() {
        let issuer = issuer();
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            roles: vec![],
            permissions: vec![],
            iat: now - 7200,
            nbf: now - 7200,
            exp: now - 3600,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(
            issuer.validate_access_token(&token).unwrap_err(),
            AuthError::TokenExpired
        );
    }

    #[test]
    fn test_wrong_secret_invalid() {
        let issuer_a = issuer();
        let issuer_b = TokenIssuer::new(
            "another-signing-key-9876543210-also-not-for-prod",
            Duration::from_secs(900),
            Duration::from_secs(3600),
            Arc::new(MemoryTokenCache::new()),
        );
        let token = issuer_a
            .issue_access_token(&account(), vec![], vec![])
            .unwrap();
        assert_eq!(
            issuer_b.validate_access_token(&token).unwrap_err(),
            AuthError::TokenInvalid
        );
    }

    #[tokio::test]
    async fn test_one_time_token_purpose_scoped() {
        let issuer = issuer();
        let id = Uuid::new_v4();
        let token = issuer
            .issue_one_time_token(id, TokenPurpose::VerifyEmail, Duration::from_secs(60))
            .await
            .unwrap();

        // Wrong purpose does not consume it
        assert_eq!(
            issuer
                .consume_one_time_token(&token, TokenPurpose::ResetPassword)
                .await
                .unwrap_err(),
            AuthError::TokenInvalid
        );
        // Right purpose does, exactly once
        assert_eq!(
            issuer
                .consume_one_time_token(&token, TokenPurpose::VerifyEmail)
                .await
                .unwrap(),
            id
        );
        assert_eq!(
            issuer
                .consume_one_time_token(&token, TokenPurpose::VerifyEmail)
                .await
                .unwrap_err(),
            AuthError::TokenInvalid
        );
    }

    #[tokio::test]
    async fn test_expired_one_time_token_reports_expired() {
        let issuer = issuer();
        let token = issuer
            .issue_one_time_token(
                Uuid::new_v4(),
                TokenPurpose::ResetPassword,
                Duration::from_secs(0),
            )
            .await
            .unwrap();
        assert_eq!(
            issuer
                .consume_one_time_token(&token, TokenPurpose::ResetPassword)
                .await
                .unwrap_err(),
            AuthError::TokenExpired
        );
    }
}
