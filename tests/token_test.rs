use std::sync::Arc;
use std::time::Duration;

use authgate::auth::token::TokenIssuer;
use authgate::error::AuthError;
use authgate::security_logger::RequestContext;
use authgate::storage::memory::MemoryTokenCache;
use uuid::Uuid;

const SECRET: &str = "integration-test-signing-key-86420";

fn issuer() -> TokenIssuer {
    TokenIssuer::new(
        SECRET,
        Duration::from_secs(900),
        Duration::from_secs(7 * 24 * 3600),
        Arc::new(MemoryTokenCache::new()),
    )
}

fn ctx() -> RequestContext {
    RequestContext::new(None, Some("10.0.0.1"))
}

#[tokio::test]
async fn test_rotation_consumes_the_presented_token() {
    let issuer = issuer();
    let account_id = Uuid::new_v4();

    let first = issuer.issue_refresh_token(account_id, "dev-1").await.unwrap();
    let (record, second) = issuer.rotate_refresh_token(&ctx(), &first).await.unwrap();
    assert_eq!(record.account_id, account_id);
    assert_eq!(record.device_id, "dev-1");
    assert_ne!(first, second);

    // The consumed token no longer rotates
    assert_eq!(
        issuer.rotate_refresh_token(&ctx(), &first).await.unwrap_err(),
        AuthError::TokenInvalid
    );
}

#[tokio::test]
async fn test_replay_revokes_the_whole_lineage() {
    let issuer = issuer();
    let account_id = Uuid::new_v4();

    let first = issuer.issue_refresh_token(account_id, "dev-1").await.unwrap();
    let (_, second) = issuer.rotate_refresh_token(&ctx(), &first).await.unwrap();

    // Replaying the rotated token fails and kills the live descendant too
    assert!(issuer.rotate_refresh_token(&ctx(), &first).await.is_err());
    assert_eq!(
        issuer.rotate_refresh_token(&ctx(), &second).await.unwrap_err(),
        AuthError::TokenInvalid
    );
}

#[tokio::test]
async fn test_concurrent_rotation_has_exactly_one_winner() {
    let issuer = Arc::new(issuer());
    let token = issuer
        .issue_refresh_token(Uuid::new_v4(), "dev-1")
        .await
        .unwrap();

    let ctx_a = ctx();
    let ctx_b = ctx();
    let a = issuer.rotate_refresh_token(&ctx_a, &token);
    let b = issuer.rotate_refresh_token(&ctx_b, &token);
    let (ra, rb) = tokio::join!(a, b);

    let successes = [ra.is_ok(), rb.is_ok()].iter().filter(|&&ok| ok).count();
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn test_revocation_is_idempotent() {
    let issuer = issuer();
    let token = issuer
        .issue_refresh_token(Uuid::new_v4(), "dev-1")
        .await
        .unwrap();

    issuer.revoke_refresh_token(&token).await.unwrap();
    issuer.revoke_refresh_token(&token).await.unwrap();
    issuer.revoke_refresh_token("never-issued").await.unwrap();

    assert_eq!(
        issuer.rotate_refresh_token(&ctx(), &token).await.unwrap_err(),
        AuthError::TokenInvalid
    );
}

#[tokio::test]
async fn test_account_wide_revocation_kills_every_device() {
    let issuer = issuer();
    let account_id = Uuid::new_v4();

    let phone = issuer.issue_refresh_token(account_id, "phone").await.unwrap();
    let laptop = issuer.issue_refresh_token(account_id, "laptop").await.unwrap();

    issuer.revoke_account_tokens(account_id).await.unwrap();

    assert_eq!(
        issuer.rotate_refresh_token(&ctx(), &phone).await.unwrap_err(),
        AuthError::TokenInvalid
    );
    assert_eq!(
        issuer.rotate_refresh_token(&ctx(), &laptop).await.unwrap_err(),
        AuthError::TokenInvalid
    );

    // Tokens issued after the bump are live
    let fresh = issuer.issue_refresh_token(account_id, "phone").await.unwrap();
    assert!(issuer.rotate_refresh_token(&ctx(), &fresh).await.is_ok());
}

#[tokio::test]
async fn test_devices_rotate_independently() {
    let issuer = issuer();
    let account_id = Uuid::new_v4();

    let phone = issuer.issue_refresh_token(account_id, "phone").await.unwrap();
    let laptop = issuer.issue_refresh_token(account_id, "laptop").await.unwrap();

    let (record, _) = issuer.rotate_refresh_token(&ctx(), &phone).await.unwrap();
    assert_eq!(record.device_id, "phone");

    // Rotating the phone token leaves the laptop's untouched
    let (record, _) = issuer.rotate_refresh_token(&ctx(), &laptop).await.unwrap();
    assert_eq!(record.device_id, "laptop");
}
