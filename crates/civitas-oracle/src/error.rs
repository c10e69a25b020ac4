//! Error types for the LLM oracle.
//!
//! Uses `thiserror` for typed errors that surface through the whole call
//! pipeline: prompt rendering, HTTP calls, status handling, and response
//! parsing. Every variant maps onto an [`OracleError`] at the trait seam.

use civitas_core::decision::OracleError;

/// Errors that can occur while talking to an LLM provider.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// A prompt template failed to load or render.
    #[error("template error: {0}")]
    Template(String),

    /// The provider rejected the API key (HTTP 401).
    #[error("{provider} rejected the API key")]
    Unauthorized {
        /// Provider that refused.
        provider: String,
    },

    /// The provider or the local limiter refused the request.
    #[error("{provider} is rate limited, retry in {retry_after_ms}ms")]
    RateLimited {
        /// Provider that refused.
        provider: String,
        /// Milliseconds until a retry may succeed.
        retry_after_ms: u64,
    },

    /// The provider answered with a non-success status.
    #[error("{provider} returned {status}: {body}")]
    Status {
        /// Provider that failed.
        provider: String,
        /// HTTP status code.
        status: u16,
        /// Response body, if readable.
        body: String,
    },

    /// The request never got an answer.
    #[error("{provider} request failed: {message}")]
    Transport {
        /// Provider that failed.
        provider: String,
        /// Transport error text.
        message: String,
    },

    /// The response JSON did not have the expected shape.
    #[error("{provider} response missing {field}")]
    MissingContent {
        /// Provider that answered.
        provider: String,
        /// Path that was absent.
        field: &'static str,
    },

    /// The response text held no usable JSON.
    #[error("response parse error: {0}")]
    Parse(String),

    /// No provider is configured or every provider is exhausted.
    #[error("no provider available")]
    NoProvider,
}

impl From<LlmError> for OracleError {
    fn from(err: LlmError) -> Self {
        let message = err.to_string();
        match err {
            LlmError::Unauthorized { provider } => Self::Unauthorized { provider },
            LlmError::RateLimited {
                provider,
                retry_after_ms,
            } => Self::RateLimited {
                provider,
                retry_after_ms,
            },
            LlmError::Status { provider, .. }
            | LlmError::Transport { provider, .. }
            | LlmError::MissingContent { provider, .. } => Self::Provider { provider, message },
            LlmError::Parse(reason) | LlmError::Template(reason) => Self::Parse { reason },
            LlmError::NoProvider => Self::Unavailable {
                reason: "no provider available".to_owned(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_keeps_the_detail() {
        let err = LlmError::Status {
            provider: "openai".to_owned(),
            status: 500,
            body: "boom".to_owned(),
        };
        match OracleError::from(err) {
            OracleError::Provider { provider, message } => {
                assert_eq!(provider, "openai");
                assert!(message.contains("500"));
                assert!(message.contains("boom"));
            }
            other => panic!("Expected Provider, got {other:?}"),
        }
    }

    #[test]
    fn no_provider_means_unavailable() {
        assert!(matches!(
            OracleError::from(LlmError::NoProvider),
            OracleError::Unavailable { .. }
        ));
    }
}
