/// Failures talking to the completion backend. All are recoverable by the
/// caller's fallback reply.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No API key configured.
    #[error("completion provider is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("completion request timed out")]
    Timeout,

    #[error("completion request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("completion API error HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("completion response had no text")]
    EmptyReply,

    #[error("completion response malformed: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Label for the `error_type` metric dimension.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "not_configured",
            Self::Timeout => "timeout",
            Self::Http(_) => "http",
            Self::Status { .. } => "status",
            Self::EmptyReply => "empty",
            Self::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e)
        }
    }
}

pub type Result<T, E = ProviderError> = std::result::Result<T, E>;
