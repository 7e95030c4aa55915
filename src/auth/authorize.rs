//! Claims-based authorization checks
//!
//! Decisions are made purely from the validated claim snapshot; no store
//! round trip happens here. Absent claims always deny.

use crate::auth::account::roles;
use crate::auth::token::Claims;
use crate::error::{AuthError, Result};
use crate::security_logger::{log_security_event, RequestContext, SecurityEvent};

/// True when the claims carry the named permission. Admins hold every
/// permission implicitly.
pub fn has_permission(claims: Option<&Claims>, permission: &str) -> bool {
    match claims {
        Some(c) => {
            c.roles.iter().any(|r| r == roles::ADMIN)
                || c.permissions.iter().any(|p| p == permission)
        }
        None => false,
    }
}

/// True when the claims carry the named role
pub fn has_role(claims: Option<&Claims>, role: &str) -> bool {
    match claims {
        Some(c) => c.roles.iter().any(|r| r == role),
        None => false,
    }
}

/// True when the claims carry at least one of the named roles
pub fn has_any_role(claims: Option<&Claims>, wanted: &[&str]) -> bool {
    match claims {
        Some(c) => wanted.iter().any(|w| c.roles.iter().any(|r| r == w)),
        None => false,
    }
}

/// Require a permission, emitting a security event on denial
pub async fn require_permission(
    ctx: &RequestContext,
    claims: Option<&Claims>,
    permission: &str,
) -> Result<()> {
    if has_permission(claims, permission) {
        return Ok(());
    }
    log_security_event(SecurityEvent::PermissionDenied {
        subject: claims
            .map(|c| c.sub.to_string())
            .unwrap_or_else(|| "anonymous".to_string()),
        required: permission.to_string(),
        correlation_id: ctx.correlation_id.clone(),
    })
    .await;
    Err(AuthError::InsufficientPermissions)
}

/// Require a role, emitting a security event on denial
pub async fn require_role(
    ctx: &RequestContext,
    claims: Option<&Claims>,
    role: &str,
) -> Result<()> {
    if has_role(claims, role) {
        return Ok(());
    }
    log_security_event(SecurityEvent::PermissionDenied {
        subject: claims
            .map(|c| c.sub.to_string())
            .unwrap_or_else(|| "anonymous".to_string()),
        required: format!("role:{}", role),
        correlation_id: ctx.correlation_id.clone(),
    })
    .await;
    Err(AuthError::InsufficientPermissions)
}
