use std::sync::Arc;

use authgate::auth::engine::{AuthEngine, AuthSession};
use authgate::config::AuthConfig;
use authgate::error::AuthError;
use authgate::security_logger::RequestContext;
use authgate::storage::memory::{MemoryCredentialStore, MemoryEmailDispatcher, MemoryTokenCache};
use authgate::storage::traits::CredentialStore;

struct Fixture {
    engine: AuthEngine,
    store: Arc<MemoryCredentialStore>,
    email: Arc<MemoryEmailDispatcher>,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryCredentialStore::new());
    let email = Arc::new(MemoryEmailDispatcher::new());
    let engine = AuthEngine::new(
        AuthConfig::for_testing(),
        store.clone(),
        Arc::new(MemoryTokenCache::new()),
        email.clone(),
    )
    .unwrap();
    Fixture {
        engine,
        store,
        email,
    }
}

fn ctx() -> RequestContext {
    RequestContext::new(None, Some("10.0.0.1"))
}

/// Pull the one-time token out of the most recent captured email
async fn last_emailed_token(email: &MemoryEmailDispatcher) -> String {
    email
        .last()
        .await
        .expect("an email was dispatched")
        .data["token"]
        .as_str()
        .expect("email carries a token")
        .to_string()
}

async fn register_and_verify(f: &Fixture, address: &str, password: &str) {
    f.engine
        .register(&ctx(), address, password, "dev-1")
        .await
        .unwrap();
    let token = last_emailed_token(&f.email).await;
    f.engine.verify_email(&ctx(), &token).await.unwrap();
}

#[tokio::test]
async fn test_full_account_lifecycle() {
    let f = fixture();

    let account = f
        .engine
        .register(&ctx(), "Alice@Example.com", "Passw0rd!", "dev-1")
        .await
        .unwrap()
        .account;
    assert_eq!(account.email, "alice@example.com");
    assert!(!account.email_verified);

    // Unverified accounts cannot log in, even with the right password
    assert_eq!(
        f.engine
            .login(&ctx(), "alice@example.com", "Passw0rd!", "dev-1")
            .await
            .unwrap_err(),
        AuthError::EmailNotVerified
    );

    let token = last_emailed_token(&f.email).await;
    f.engine.verify_email(&ctx(), &token).await.unwrap();

    let session: AuthSession = f
        .engine
        .login(&ctx(), "ALICE@example.COM", "Passw0rd!", "dev-1")
        .await
        .unwrap();
    let claims = f.engine.validate_access_token(&session.access_token).unwrap();
    assert_eq!(claims.sub, account.id);
    assert_eq!(claims.email, "alice@example.com");
    assert!(claims.roles.contains(&"user".to_string()));
    assert!(claims.permissions.contains(&"users.read".to_string()));

    // Refresh rotates the token pair
    let refreshed = f.engine.refresh(&ctx(), &session.refresh_token).await.unwrap();
    assert_ne!(refreshed.refresh_token, session.refresh_token);
    assert!(f.engine.validate_access_token(&refreshed.access_token).is_ok());

    // After logout the refresh token is dead
    f.engine.logout(&ctx(), &refreshed.refresh_token).await.unwrap();
    assert_eq!(
        f.engine
            .refresh(&ctx(), &refreshed.refresh_token)
            .await
            .unwrap_err(),
        AuthError::TokenInvalid
    );
}

#[tokio::test]
async fn test_registration_issues_a_usable_token_pair() {
    let f = fixture();
    let session = f
        .engine
        .register(&ctx(), "ivan@x.com", "Passw0rd!", "dev-1")
        .await
        .unwrap();

    // The new user is signed in immediately, before verifying their email
    let claims = f.engine.validate_access_token(&session.access_token).unwrap();
    assert_eq!(claims.sub, session.account.id);
    assert_eq!(claims.email, "ivan@x.com");

    let refreshed = f.engine.refresh(&ctx(), &session.refresh_token).await.unwrap();
    assert!(f.engine.validate_access_token(&refreshed.access_token).is_ok());
}

#[tokio::test]
async fn test_duplicate_registration_is_case_insensitive() {
    let f = fixture();
    f.engine
        .register(&ctx(), "bob@x.com", "Passw0rd!", "dev-1")
        .await
        .unwrap();
    assert_eq!(
        f.engine
            .register(&ctx(), "BOB@X.COM", "Different1!", "dev-2")
            .await
            .unwrap_err(),
        AuthError::UserAlreadyExists
    );
}

#[tokio::test]
async fn test_account_locks_after_repeated_failures() {
    let f = fixture();
    register_and_verify(&f, "carol@x.com", "Passw0rd!").await;
    let max = AuthConfig::for_testing().max_failed_attempts;

    for _ in 0..max - 1 {
        assert_eq!(
            f.engine
                .login(&ctx(), "carol@x.com", "wrong-pass1", "dev-1")
                .await
                .unwrap_err(),
            AuthError::InvalidCredentials
        );
    }
    // The attempt that crosses the threshold reports the lock
    let err = f
        .engine
        .login(&ctx(), "carol@x.com", "wrong-pass1", "dev-1")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountLocked(_)));

    // The correct password does not open a locked account
    let err = f
        .engine
        .login(&ctx(), "carol@x.com", "Passw0rd!", "dev-1")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountLocked(_)));
}

#[tokio::test]
async fn test_successful_login_resets_failure_counter() {
    let f = fixture();
    register_and_verify(&f, "dave@x.com", "Passw0rd!").await;

    for _ in 0..2 {
        let _ = f.engine.login(&ctx(), "dave@x.com", "wrong-pass1", "dev-1").await;
    }
    let session = f
        .engine
        .login(&ctx(), "dave@x.com", "Passw0rd!", "dev-1")
        .await
        .unwrap();

    let account = f
        .store
        .get_account_by_email("dave@x.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.failed_attempts, 0);
    assert_eq!(session.account.id, account.id);
}

#[tokio::test]
async fn test_password_reset_invalidates_outstanding_refresh_tokens() {
    let f = fixture();
    register_and_verify(&f, "erin@x.com", "OldPassw0rd!").await;
    let session = f
        .engine
        .login(&ctx(), "erin@x.com", "OldPassw0rd!", "dev-1")
        .await
        .unwrap();

    f.engine.forgot_password(&ctx(), "erin@x.com").await.unwrap();
    let reset_token = last_emailed_token(&f.email).await;
    f.engine
        .reset_password(&ctx(), &reset_token, "NewPassw0rd!")
        .await
        .unwrap();

    // The pre-reset refresh token is dead
    assert_eq!(
        f.engine
            .refresh(&ctx(), &session.refresh_token)
            .await
            .unwrap_err(),
        AuthError::TokenInvalid
    );
    // Old password no longer works, new one does
    assert_eq!(
        f.engine
            .login(&ctx(), "erin@x.com", "OldPassw0rd!", "dev-1")
            .await
            .unwrap_err(),
        AuthError::InvalidCredentials
    );
    assert!(f
        .engine
        .login(&ctx(), "erin@x.com", "NewPassw0rd!", "dev-1")
        .await
        .is_ok());
}

#[tokio::test]
async fn test_reset_token_is_single_use() {
    let f = fixture();
    register_and_verify(&f, "frank@x.com", "Passw0rd!").await;

    f.engine.forgot_password(&ctx(), "frank@x.com").await.unwrap();
    let reset_token = last_emailed_token(&f.email).await;
    f.engine
        .reset_password(&ctx(), &reset_token, "NewPassw0rd!")
        .await
        .unwrap();
    assert_eq!(
        f.engine
            .reset_password(&ctx(), &reset_token, "OtherPassw0rd!")
            .await
            .unwrap_err(),
        AuthError::TokenInvalid
    );
}

#[tokio::test]
async fn test_forgot_password_never_discloses_account_existence() {
    let f = fixture();
    assert!(f
        .engine
        .forgot_password(&ctx(), "nobody@x.com")
        .await
        .is_ok());
    assert!(f.email.sent().await.is_empty());
}

#[tokio::test]
async fn test_email_failure_does_not_fail_registration() {
    let f = fixture();
    f.email.set_failing(true);
    let session = f
        .engine
        .register(&ctx(), "grace@x.com", "Passw0rd!", "dev-1")
        .await
        .unwrap();
    assert_eq!(session.account.email, "grace@x.com");
    assert!(f.email.sent().await.is_empty());
}

#[tokio::test]
async fn test_verification_token_is_single_use() {
    let f = fixture();
    f.engine
        .register(&ctx(), "heidi@x.com", "Passw0rd!", "dev-1")
        .await
        .unwrap();
    let token = last_emailed_token(&f.email).await;

    f.engine.verify_email(&ctx(), &token).await.unwrap();
    assert_eq!(
        f.engine.verify_email(&ctx(), &token).await.unwrap_err(),
        AuthError::TokenInvalid
    );
}
