//! Request screening gate
//!
//! Runs ahead of any engine operation: injection screen over headers, query
//! parameters and body text, then a fixed-window rate limit per client, then
//! a hard cap on body size. Rejections are generic; the offending value is
//! never echoed back to the caller, only counted and logged by kind.

use std::sync::Arc;
use std::time::Duration;

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::security::injection::{contains_sql_injection, contains_xss_patterns};
use crate::security_logger::{log_security_event, RequestContext, SecurityEvent};
use crate::storage::traits::TokenCache;

/// The screened surface of an inbound request
#[derive(Debug, Default)]
pub struct RequestParts {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
    pub body_len: usize,
}

pub struct RequestGuard {
    cache: Arc<dyn TokenCache>,
    rate_limit_requests: u32,
    rate_limit_window: Duration,
    max_body_bytes: usize,
}

impl RequestGuard {
    pub fn new(config: &AuthConfig, cache: Arc<dyn TokenCache>) -> Self {
        Self {
            cache,
            rate_limit_requests: config.rate_limit_requests,
            rate_limit_window: config.rate_limit_window,
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Screen a request. `Ok(())` means the engine may proceed.
    pub async fn inspect(&self, ctx: &RequestContext, parts: &RequestParts) -> Result<()> {
        self.screen_injection(ctx, parts).await?;
        self.enforce_rate_limit(ctx).await?;

        if parts.body_len > self.max_body_bytes {
            log_security_event(SecurityEvent::OversizedBody {
                size: parts.body_len,
                correlation_id: ctx.correlation_id.clone(),
            })
            .await;
            return Err(AuthError::ValidationFailed(
                "request body too large".to_string(),
            ));
        }

        Ok(())
    }

    async fn screen_injection(&self, ctx: &RequestContext, parts: &RequestParts) -> Result<()> {
        for (name, value) in &parts.headers {
            if contains_xss_patterns(value) {
                return self.reject_injection(ctx, "xss", &format!("header:{}", name)).await;
            }
        }

        for (name, value) in &parts.query {
            if contains_xss_patterns(value) {
                return self.reject_injection(ctx, "xss", &format!("query:{}", name)).await;
            }
            if contains_sql_injection(value) {
                return self.reject_injection(ctx, "sql", &format!("query:{}", name)).await;
            }
        }

        if let Some(body) = &parts.body {
            if contains_xss_patterns(body) {
                return self.reject_injection(ctx, "xss", "body").await;
            }
            if contains_sql_injection(body) {
                return self.reject_injection(ctx, "sql", "body").await;
            }
        }

        Ok(())
    }

    async fn reject_injection(&self, ctx: &RequestContext, kind: &str, field: &str) -> Result<()> {
        log_security_event(SecurityEvent::InjectionAttempt {
            kind: kind.to_string(),
            field: field.to_string(),
            correlation_id: ctx.correlation_id.clone(),
        })
        .await;
        // Deliberately generic; never reflects the offending value
        Err(AuthError::ValidationFailed("invalid request".to_string()))
    }

    async fn enforce_rate_limit(&self, ctx: &RequestContext) -> Result<()> {
        let client = ctx.client.as_deref().unwrap_or("unknown");
        let key = format!("auth:ratelimit:{}", client);
        let count = self.cache.incr(&key, self.rate_limit_window).await?;

        if count > self.rate_limit_requests as u64 {
            log_security_event(SecurityEvent::RateLimitExceeded {
                client: client.to_string(),
                correlation_id: ctx.correlation_id.clone(),
            })
            .await;
            return Err(AuthError::RateLimitExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryTokenCache;

    fn guard() -> RequestGuard {
        RequestGuard::new(&AuthConfig::for_testing(), Arc::new(MemoryTokenCache::new()))
    }

    fn ctx(client: &str) -> RequestContext {
        RequestContext::new(None, Some(client))
    }

    #[tokio::test]
    async fn test_clean_request_passes() {
        let parts = RequestParts {
            headers: vec![("user-agent".to_string(), "Mozilla/5.0".to_string())],
            query: vec![("page".to_string(), "2".to_string())],
            body: Some(r#"{"email":"a@x.com"}"#.to_string()),
            body_len: 19,
        };
        assert!(guard().inspect(&ctx("10.0.0.1"), &parts).await.is_ok());
    }

    #[tokio::test]
    async fn test_xss_header_rejected_generically() {
        let parts = RequestParts {
            headers: vec![(
                "user-agent".to_string(),
                "<script>alert(1)</script>".to_string(),
            )],
            ..Default::default()
        };
        let err = guard().inspect(&ctx("10.0.0.2"), &parts).await.unwrap_err();
        match err {
            AuthError::ValidationFailed(msg) => {
                assert!(!msg.contains("script"));
            }
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sql_query_param_rejected() {
        let parts = RequestParts {
            query: vec![("q".to_string(), "' OR 1=1 --".to_string())],
            ..Default::default()
        };
        assert!(guard().inspect(&ctx("10.0.0.3"), &parts).await.is_err());
    }

    #[tokio::test]
    async fn test_rate_limit_enforced_per_client() {
        let guard = guard();
        let parts = RequestParts::default();
        let limit = AuthConfig::for_testing().rate_limit_requests;

        for _ in 0..limit {
            assert!(guard.inspect(&ctx("10.0.0.4"), &parts).await.is_ok());
        }
        assert_eq!(
            guard.inspect(&ctx("10.0.0.4"), &parts).await.unwrap_err(),
            AuthError::RateLimitExceeded
        );
        // A different client is unaffected
        assert!(guard.inspect(&ctx("10.0.0.5"), &parts).await.is_ok());
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let guard = guard();
        let parts = RequestParts {
            body_len: AuthConfig::for_testing().max_body_bytes + 1,
            ..Default::default()
        };
        assert!(guard.inspect(&ctx("10.0.0.6"), &parts).await.is_err());
    }
}
