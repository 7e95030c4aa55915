//! Authentication engine: orchestrates credential checks, lockout, token
//! issuance and account lifecycle against the storage collaborators
//!
//! The engine holds no mutable state of its own. Every operation takes a
//! request context for audit correlation, and every collaborator call is
//! bounded by the configured deadline so a stalled store or cache surfaces
//! as a retryable internal error instead of hanging the request.
//!
//! Login and the password-recovery entry points are padded to a minimum
//! wall time so their failure modes are indistinguishable by timing.

use regex::Regex;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

use crate::auth::account::{roles, Account};
use crate::auth::lockout::LockoutPolicy;
use crate::auth::password::PasswordHasher;
use crate::auth::token::{Claims, TokenIssuer, TokenPurpose};
use crate::config::AuthConfig;
use crate::constants::MIN_PASSWORD_LENGTH;
use crate::error::{AuthError, Result};
use crate::security::timing::AuthTimer;
use crate::security_logger::{log_security_event, RequestContext, SecurityEvent};
use crate::storage::traits::{CredentialStore, EmailDispatcher, NewAccount, TokenCache};

/// Successful authentication: the account plus its token pair
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub account: Account,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthEngine {
    config: AuthConfig,
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    issuer: TokenIssuer,
    lockout: LockoutPolicy,
    email: Arc<dyn EmailDispatcher>,
}

impl AuthEngine {
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn TokenCache>,
        email: Arc<dyn EmailDispatcher>,
    ) -> Result<Self> {
        config.validate()?;
        let hasher = PasswordHasher::new(config.hash_cost)?;
        let issuer = TokenIssuer::new(
            &config.jwt_secret,
            config.access_token_ttl,
            config.refresh_token_ttl,
            cache,
        );
        let lockout = LockoutPolicy::new(
            store.clone(),
            config.max_failed_attempts,
            config.lockout_duration,
        );
        Ok(Self {
            config,
            store,
            hasher,
            issuer,
            lockout,
            email,
        })
    }

    /// Register a new account, dispatch its verification email and issue an
    /// initial token pair so the new user is signed in straight away. The
    /// account stays unverified until the emailed token is consumed, and a
    /// fresh login is refused until then.
    pub async fn register(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
        device_id: &str,
    ) -> Result<AuthSession> {
        let timer = AuthTimer::start();
        let result = self.register_inner(ctx, email, password, device_id).await;
        timer.wait().await;
        result
    }

    async fn register_inner(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
        device_id: &str,
    ) -> Result<AuthSession> {
        let email = validate_email(email)?;
        self.validate_password(password)?;

        let password_hash = self.hasher.hash(password)?;
        let account = self
            .bounded(self.store.create_account(NewAccount {
                email,
                password_hash,
                roles: vec![roles::USER.to_string()],
            }))
            .await?;

        let token = self
            .bounded(self.issuer.issue_one_time_token(
                account.id,
                TokenPurpose::VerifyEmail,
                self.config.email_verify_ttl,
            ))
            .await?;
        self.dispatch_email(
            ctx,
            &account.email,
            "verify-email",
            serde_json::json!({ "token": token }),
        )
        .await;

        let (roles, permissions) = self
            .bounded(self.store.roles_and_permissions(account.id))
            .await?;
        let access_token = self.issuer.issue_access_token(&account, roles, permissions)?;
        let refresh_token = self
            .bounded(self.issuer.issue_refresh_token(account.id, device_id))
            .await?;

        Ok(AuthSession {
            account,
            access_token,
            refresh_token,
        })
    }

    /// Authenticate a credential pair and issue a token pair. `device_id`
    /// keys the refresh-token lineage so each device rotates independently.
    pub async fn login(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
        device_id: &str,
    ) -> Result<AuthSession> {
        let timer = AuthTimer::start();
        let result = self.login_inner(ctx, email, password, device_id).await;
        timer.wait().await;
        result
    }

    async fn login_inner(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
        device_id: &str,
    ) -> Result<AuthSession> {
        let email = email.trim().to_lowercase();
        let account = match self.bounded(self.store.get_account_by_email(&email)).await? {
            Some(account) => account,
            None => {
                log_security_event(SecurityEvent::AuthenticationFailed {
                    email,
                    reason: "unknown user".to_string(),
                    correlation_id: ctx.correlation_id.clone(),
                })
                .await;
                return Err(AuthError::InvalidCredentials);
            }
        };

        if let Some(until) = self
            .bounded(self.lockout.check_locked(account.id, account.locked_until))
            .await?
        {
            return Err(AuthError::AccountLocked(until));
        }

        if !self.hasher.verify(password, &account.password_hash) {
            let status = self.bounded(self.lockout.record_failure(ctx, account.id)).await?;
            log_security_event(SecurityEvent::AuthenticationFailed {
                email,
                reason: "wrong password".to_string(),
                correlation_id: ctx.correlation_id.clone(),
            })
            .await;
            return Err(match status.locked_until {
                Some(until) => AuthError::AccountLocked(until),
                None => AuthError::InvalidCredentials,
            });
        }

        // A correct password never makes progress on an unverified account,
        // and does not reset the failure counter
        if !account.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        self.bounded(self.lockout.record_success(account.id)).await?;

        let (roles, permissions) = self
            .bounded(self.store.roles_and_permissions(account.id))
            .await?;
        let access_token = self.issuer.issue_access_token(&account, roles, permissions)?;
        let refresh_token = self
            .bounded(self.issuer.issue_refresh_token(account.id, device_id))
            .await?;

        log_security_event(SecurityEvent::AuthenticationSuccess {
            account_id: account.id,
            correlation_id: ctx.correlation_id.clone(),
        })
        .await;

        Ok(AuthSession {
            account,
            access_token,
            refresh_token,
        })
    }

    /// Rotate a refresh token into a fresh token pair. Roles and permissions
    /// are re-resolved so a revoked grant drops out of the new access token.
    pub async fn refresh(&self, ctx: &RequestContext, refresh_token: &str) -> Result<AuthSession> {
        let (record, new_refresh) = self
            .bounded(self.issuer.rotate_refresh_token(ctx, refresh_token))
            .await?;

        let account = self
            .bounded(self.store.get_account_by_id(record.account_id))
            .await?
            .ok_or(AuthError::TokenInvalid)?;

        let (roles, permissions) = self
            .bounded(self.store.roles_and_permissions(account.id))
            .await?;
        let access_token = self.issuer.issue_access_token(&account, roles, permissions)?;

        Ok(AuthSession {
            account,
            access_token,
            refresh_token: new_refresh,
        })
    }

    /// End a session by revoking its refresh token. Keyed by the refresh
    /// token rather than account id or access token: access tokens are
    /// stateless and cannot be recalled (they age out at expiry), and the
    /// refresh token alone pinpoints which device's lineage to kill without
    /// touching the account's other sessions. Idempotent.
    pub async fn logout(&self, _ctx: &RequestContext, refresh_token: &str) -> Result<()> {
        self.bounded(self.issuer.revoke_refresh_token(refresh_token))
            .await
    }

    /// Validate a presented access token into its claim set
    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        self.issuer.validate_access_token(token)
    }

    /// Consume an email-verification token and mark the account verified
    pub async fn verify_email(&self, _ctx: &RequestContext, token: &str) -> Result<()> {
        let account_id = self
            .bounded(
                self.issuer
                    .consume_one_time_token(token, TokenPurpose::VerifyEmail),
            )
            .await?;
        self.bounded(self.store.set_email_verified(account_id)).await
    }

    /// Start password recovery. Always succeeds so account existence is not
    /// disclosed; a reset email goes out only when the account exists.
    pub async fn forgot_password(&self, ctx: &RequestContext, email: &str) -> Result<()> {
        let timer = AuthTimer::start();
        let email = email.trim().to_lowercase();

        if let Ok(Some(account)) = self.bounded(self.store.get_account_by_email(&email)).await {
            match self
                .bounded(self.issuer.issue_one_time_token(
                    account.id,
                    TokenPurpose::ResetPassword,
                    self.config.password_reset_ttl,
                ))
                .await
            {
                Ok(token) => {
                    self.dispatch_email(
                        ctx,
                        &account.email,
                        "reset-password",
                        serde_json::json!({ "token": token }),
                    )
                    .await;
                }
                Err(e) => log::warn!("failed to issue password reset token: {}", e),
            }
        }

        timer.wait().await;
        Ok(())
    }

    /// Complete password recovery: set the new hash, clear any lockout and
    /// invalidate every outstanding refresh token for the account
    pub async fn reset_password(
        &self,
        ctx: &RequestContext,
        token: &str,
        new_password: &str,
    ) -> Result<()> {
        self.validate_password(new_password)?;

        let account_id = self
            .bounded(
                self.issuer
                    .consume_one_time_token(token, TokenPurpose::ResetPassword),
            )
            .await?;

        let password_hash = self.hasher.hash(new_password)?;
        self.bounded(self.store.set_password_hash(account_id, &password_hash))
            .await?;
        self.bounded(self.store.clear_failed_attempts(account_id))
            .await?;
        self.bounded(self.issuer.revoke_account_tokens(account_id))
            .await?;

        log_security_event(SecurityEvent::TokenRevoked {
            account_id,
            reason: "password reset".to_string(),
            correlation_id: ctx.correlation_id.clone(),
        })
        .await;

        Ok(())
    }

    pub async fn get_account(&self, id: Uuid) -> Result<Account> {
        self.bounded(self.store.get_account_by_id(id))
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    fn validate_password(&self, password: &str) -> Result<()> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::ValidationFailed(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        if self.config.password_complexity {
            let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
            let has_digit = password.chars().any(|c| c.is_ascii_digit());
            if !has_letter || !has_digit {
                return Err(AuthError::ValidationFailed(
                    "password must contain letters and digits".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Bound a collaborator call by the configured deadline
    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.external_call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::Internal(
                "collaborator call timed out".to_string(),
            )),
        }
    }

    /// Email delivery is best effort; failures are logged and never fail
    /// the caller's operation
    async fn dispatch_email(
        &self,
        ctx: &RequestContext,
        to: &str,
        template: &str,
        data: serde_json::Value,
    ) {
        let send = self.email.send(to, template, &data);
        let outcome = tokio::time::timeout(self.config.external_call_timeout, send).await;
        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(_) => "timed out".to_string(),
        };
        log_security_event(SecurityEvent::EmailDispatchFailed {
            template: template.to_string(),
            error,
            correlation_id: ctx.correlation_id.clone(),
        })
        .await;
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email pattern"))
}

/// Normalize and validate an email address. Stored form is trimmed
/// lowercase, so lookups and uniqueness are case-insensitive.
fn validate_email(email: &str) -> Result<String> {
    let normalized = email.trim().to_lowercase();
    if normalized.len() > 254 || !email_regex().is_match(&normalized) {
        return Err(AuthError::ValidationFailed(
            "invalid email address".to_string(),
        ));
    }
    Ok(normalized)
}
