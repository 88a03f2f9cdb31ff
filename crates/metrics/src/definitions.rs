//! Metric name and label definitions.

/// HTTP surface
pub mod http {
    /// Requests handled, labelled by route and status
    pub const REQUESTS_TOTAL: &str = "therra_http_requests_total";
    /// Request duration in seconds
    pub const REQUEST_DURATION_SECONDS: &str = "therra_http_request_duration_seconds";
}

/// Auth gate
pub mod auth {
    /// Requests rejected by the auth gate, labelled by `reason`
    pub const REJECTIONS_TOTAL: &str = "therra_auth_rejections_total";
    /// Requests that resolved a tenant binding
    pub const ACCEPTED_TOTAL: &str = "therra_auth_accepted_total";
    /// Secret lookups that matched more than one active binding
    pub const AMBIGUOUS_SECRET_TOTAL: &str = "therra_auth_ambiguous_secret_total";
}

/// Message pipeline
pub mod pipeline {
    /// Inbound messages processed, labelled by channel and intent
    pub const MESSAGES_TOTAL: &str = "therra_pipeline_messages_total";
    /// Replies that fell back to the apology text
    pub const FALLBACK_REPLIES_TOTAL: &str = "therra_pipeline_fallback_replies_total";
    /// Reply dispatches that failed or timed out
    pub const DISPATCH_FAILURES_TOTAL: &str = "therra_pipeline_dispatch_failures_total";
    /// End-to-end processing time in seconds
    pub const DURATION_SECONDS: &str = "therra_pipeline_duration_seconds";
}

/// AI provider
pub mod provider {
    /// Completion requests sent
    pub const COMPLETIONS_TOTAL: &str = "therra_provider_completions_total";
    /// Completion errors, labelled by `error_type`
    pub const COMPLETION_ERRORS_TOTAL: &str = "therra_provider_completion_errors_total";
    /// Completion duration in seconds
    pub const COMPLETION_DURATION_SECONDS: &str = "therra_provider_completion_duration_seconds";
}

/// Persistence adapter
pub mod persistence {
    /// Exchange log writes that failed or timed out
    pub const LOG_FAILURES_TOTAL: &str = "therra_persistence_log_failures_total";
    /// Exchange log rows written
    pub const LOG_WRITES_TOTAL: &str = "therra_persistence_log_writes_total";
}

/// Credential vault
pub mod vault {
    /// Decryption failures, labelled by `kind` (integrity / format)
    pub const DECRYPT_FAILURES_TOTAL: &str = "therra_vault_decrypt_failures_total";
}

/// Channel sessions
pub mod sessions {
    /// Live sessions
    pub const ACTIVE: &str = "therra_sessions_active";
    /// State transitions, labelled by `state`
    pub const TRANSITIONS_TOTAL: &str = "therra_session_transitions_total";
    /// Reconnect attempts after a retryable close
    pub const RECONNECTS_TOTAL: &str = "therra_session_reconnects_total";
    /// Sessions that reached the terminal state
    pub const TERMINAL_TOTAL: &str = "therra_session_terminal_total";
    /// Credential blob saves that failed
    pub const CREDS_SAVE_FAILURES_TOTAL: &str = "therra_session_creds_save_failures_total";
}

/// Telegram adapter
pub mod telegram {
    /// Webhook updates received
    pub const UPDATES_RECEIVED_TOTAL: &str = "therra_telegram_updates_received_total";
    /// Messages sent
    pub const MESSAGES_SENT_TOTAL: &str = "therra_telegram_messages_sent_total";
}

/// Provisioning
pub mod provisioning {
    /// Bindings created or rotated, labelled by channel
    pub const BINDINGS_UPSERTED_TOTAL: &str = "therra_bindings_upserted_total";
    /// Bindings disabled
    pub const BINDINGS_DISABLED_TOTAL: &str = "therra_bindings_disabled_total";
}

/// Common label keys
pub mod labels {
    pub const CHANNEL: &str = "channel";
    pub const INTENT: &str = "intent";
    pub const REASON: &str = "reason";
    pub const STATE: &str = "state";
    pub const ERROR_TYPE: &str = "error_type";
    pub const ROUTE: &str = "route";
    pub const STATUS: &str = "status";
}

/// Standard histogram buckets
pub mod buckets {
    use once_cell::sync::Lazy;

    /// HTTP and pipeline durations, 1ms to 60s
    pub static HTTP_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]
    });

    /// Provider completion durations, 100ms to 2 minutes
    pub static COMPLETION_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0]
    });
}
