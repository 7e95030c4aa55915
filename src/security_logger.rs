//! Security-focused logging module to track authentication and abuse events
//!
//! Every event carries the correlation identifier of the inbound request so
//! an operator can stitch an attack or a support case back together across
//! log lines. Events are counted per type and an alert is raised when a
//! type crosses its threshold.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Per-request context propagated into the engine and the guard.
/// The correlation id comes from the inbound request when present and is
/// generated otherwise, so every emitted event is traceable.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: String,
    /// Client identity for rate limiting and audit (IP or account id)
    pub client: Option<String>,
}

impl RequestContext {
    pub fn new(correlation_id: Option<&str>, client: Option<&str>) -> Self {
        Self {
            correlation_id: correlation_id
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            client: client.map(str::to_string),
        }
    }
}

/// Types of security events to track
#[derive(Debug, Clone)]
pub enum SecurityEvent {
    // Authentication events
    AuthenticationFailed { email: String, reason: String, correlation_id: String },
    AuthenticationSuccess { account_id: Uuid, correlation_id: String },
    AccountLocked { account_id: Uuid, until: DateTime<Utc>, correlation_id: String },

    // Token events
    TokenReplayDetected { lineage_id: String, correlation_id: String },
    TokenRevoked { account_id: Uuid, reason: String, correlation_id: String },

    // Request screening
    InjectionAttempt { kind: String, field: String, correlation_id: String },
    RateLimitExceeded { client: String, correlation_id: String },
    OversizedBody { size: usize, correlation_id: String },

    // Authorization
    PermissionDenied { subject: String, required: String, correlation_id: String },

    // Degraded operation
    EmailDispatchFailed { template: String, error: String, correlation_id: String },
}

/// Security event with timestamp
#[derive(Debug, Clone)]
struct TimestampedEvent {
    event: SecurityEvent,
    timestamp: Instant,
}

/// Security logger for tracking and alerting on security events
pub struct SecurityLogger {
    events: Arc<RwLock<Vec<TimestampedEvent>>>,
    event_counts: Arc<RwLock<HashMap<String, usize>>>,
    max_events: usize,
    alert_thresholds: HashMap<String, usize>,
}

impl SecurityLogger {
    pub fn new() -> Self {
        let mut alert_thresholds = HashMap::new();
        alert_thresholds.insert("auth_failed".to_string(), 5);
        alert_thresholds.insert("account_locked".to_string(), 3);
        alert_thresholds.insert("token_replay".to_string(), 1);
        alert_thresholds.insert("injection_attempt".to_string(), 1);
        alert_thresholds.insert("rate_limit".to_string(), 10);
        alert_thresholds.insert("permission_denied".to_string(), 20);

        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            event_counts: Arc::new(RwLock::new(HashMap::new())),
            max_events: 10000,
            alert_thresholds,
        }
    }

    /// Log a security event
    pub async fn log_event(&self, event: SecurityEvent) {
        let event_key = self.event_key(&event);

        {
            let mut events = self.events.write().await;
            events.push(TimestampedEvent {
                event: event.clone(),
                timestamp: Instant::now(),
            });
            if events.len() > self.max_events {
                let overflow = events.len() - self.max_events;
                events.drain(0..overflow);
            }
        }

        {
            let mut counts = self.event_counts.write().await;
            let count = counts.entry(event_key.clone()).or_insert(0);
            *count += 1;
            if let Some(&threshold) = self.alert_thresholds.get(&event_key) {
                if *count >= threshold {
                    self.trigger_alert(&event_key, *count, &event);
                    *count = 0; // Reset counter after alert
                }
            }
        }

        match event {
            SecurityEvent::AuthenticationFailed { email, reason, correlation_id } => {
                log::warn!(
                    "SECURITY: Authentication failed - Email: {}, Reason: {}, Correlation: {}",
                    email, reason, correlation_id
                );
            }
            SecurityEvent::AuthenticationSuccess { account_id, correlation_id } => {
                log::info!(
                    "SECURITY: Authentication success - Account: {}, Correlation: {}",
                    account_id, correlation_id
                );
            }
            SecurityEvent::AccountLocked { account_id, until, correlation_id } => {
                log::warn!(
                    "SECURITY: Account locked - Account: {}, Until: {}, Correlation: {}",
                    account_id, until, correlation_id
                );
            }
            SecurityEvent::TokenReplayDetected { lineage_id, correlation_id } => {
                log::error!(
                    "SECURITY: Refresh token replay detected, lineage revoked - Lineage: {}, Correlation: {}",
                    lineage_id, correlation_id
                );
            }
            SecurityEvent::TokenRevoked { account_id, reason, correlation_id } => {
                log::info!(
                    "SECURITY: Tokens revoked - Account: {}, Reason: {}, Correlation: {}",
                    account_id, reason, correlation_id
                );
            }
            SecurityEvent::InjectionAttempt { kind, field, correlation_id } => {
                // The offending value is deliberately not logged
                log::error!(
                    "SECURITY: Injection attempt - Kind: {}, Field: {}, Correlation: {}",
                    kind, field, correlation_id
                );
            }
            SecurityEvent::RateLimitExceeded { client, correlation_id } => {
                log::warn!(
                    "SECURITY: Rate limit exceeded - Client: {}, Correlation: {}",
                    client, correlation_id
                );
            }
            SecurityEvent::OversizedBody { size, correlation_id } => {
                log::warn!(
                    "SECURITY: Oversized request body rejected - Size: {}, Correlation: {}",
                    size, correlation_id
                );
            }
            SecurityEvent::PermissionDenied { subject, required, correlation_id } => {
                log::warn!(
                    "SECURITY: Permission denied - Subject: {}, Required: {}, Correlation: {}",
                    subject, required, correlation_id
                );
            }
            SecurityEvent::EmailDispatchFailed { template, error, correlation_id } => {
                log::warn!(
                    "SECURITY: Email dispatch degraded - Template: {}, Error: {}, Correlation: {}",
                    template, error, correlation_id
                );
            }
        }
    }

    fn event_key(&self, event: &SecurityEvent) -> String {
        match event {
            SecurityEvent::AuthenticationFailed { .. } => "auth_failed",
            SecurityEvent::AuthenticationSuccess { .. } => "auth_success",
            SecurityEvent::AccountLocked { .. } => "account_locked",
            SecurityEvent::TokenReplayDetected { .. } => "token_replay",
            SecurityEvent::TokenRevoked { .. } => "token_revoked",
            SecurityEvent::InjectionAttempt { .. } => "injection_attempt",
            SecurityEvent::RateLimitExceeded { .. } => "rate_limit",
            SecurityEvent::OversizedBody { .. } => "oversized_body",
            SecurityEvent::PermissionDenied { .. } => "permission_denied",
            SecurityEvent::EmailDispatchFailed { .. } => "email_degraded",
        }
        .to_string()
    }

    fn trigger_alert(&self, event_type: &str, count: usize, sample_event: &SecurityEvent) {
        log::error!(
            "SECURITY ALERT: {} events of type '{}' detected, sample: {:?}",
            count, event_type, sample_event
        );
    }

    /// Get recent security events
    pub async fn recent_events(&self, duration: Duration) -> Vec<SecurityEvent> {
        let events = self.events.read().await;
        let cutoff = Instant::now() - duration;
        events
            .iter()
            .filter(|e| e.timestamp > cutoff)
            .map(|e| e.event.clone())
            .collect()
    }

    /// Get event statistics
    pub async fn event_stats(&self) -> HashMap<String, usize> {
        self.event_counts.read().await.clone()
    }
}

impl Default for SecurityLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// Global security logger instance - thread-safe singleton
static SECURITY_LOGGER: OnceLock<Arc<SecurityLogger>> = OnceLock::new();

/// Get the global security logger, initializing it on first use
pub fn security_logger() -> Arc<SecurityLogger> {
    SECURITY_LOGGER
        .get_or_init(|| Arc::new(SecurityLogger::new()))
        .clone()
}

/// Log a security event using the global logger
pub async fn log_security_event(event: SecurityEvent) {
    security_logger().log_event(event).await;
}
