/// Error enum for failures from the daemon's external collaborators: the
/// Notion workspace, the two model APIs, and the mail transport.
///
/// Pipeline code never catches these; they propagate to the scheduler, which
/// runs each page's error through [`diagnose`] and records the result in that
/// page's queue record instead of aborting the cycle.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("rate limit exceeded at {service}: {message}")]
    RateLimited {
        service: &'static str,
        message: String,
    },

    #[error("{service} rejected credentials: {message}")]
    Auth {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned HTTP {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed response from {service}: {message}")]
    BadResponse {
        service: &'static str,
        message: String,
    },

    #[error("mail delivery failed: {0}")]
    Mail(String),
}

impl PipelineError {
    /// Classify a non-2xx HTTP status from a collaborator.
    pub fn from_status(service: &'static str, status: u16, message: String) -> Self {
        match status {
            429 => PipelineError::RateLimited { service, message },
            401 | 403 => PipelineError::Auth { service, message },
            _ => PipelineError::Api {
                service,
                status,
                message,
            },
        }
    }
}

/// Map a pipeline failure to the human-readable category stored in a queue
/// record and shown in the digest.
///
/// Typed variants are matched first; the substring checks catch categories
/// that only surface in a collaborator's message text.
pub fn diagnose(err: &PipelineError) -> String {
    let msg = err.to_string();
    let lower = msg.to_lowercase();

    match err {
        PipelineError::RateLimited { .. } => {
            format!("Rate limit exceeded - will retry next cycle. ({})", msg)
        }
        PipelineError::Auth { .. } => {
            format!("API authentication failed - check your API keys. ({})", msg)
        }
        PipelineError::Transport { source, .. } if source.is_timeout() => {
            format!("Request timed out - API may be slow. ({})", msg)
        }
        PipelineError::Transport { .. } => {
            format!("Network connection error - check internet access. ({})", msg)
        }
        PipelineError::Api {
            service: "notion", ..
        }
        | PipelineError::BadResponse {
            service: "notion", ..
        } => format!("Notion API error: {}", msg),
        _ if lower.contains("rate limit") || lower.contains("rate_limit") => {
            format!("Rate limit exceeded - will retry next cycle. ({})", msg)
        }
        _ if lower.contains("authentication") => {
            format!("API authentication failed - check your API keys. ({})", msg)
        }
        _ if lower.contains("connection") => {
            format!("Network connection error - check internet access. ({})", msg)
        }
        _ if lower.contains("timeout") || lower.contains("timed out") => {
            format!("Request timed out - API may be slow. ({})", msg)
        }
        _ => format!("Unexpected error: {}", msg),
    }
}
