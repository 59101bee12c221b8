use std::time::Duration;
use thiserror::Error;

/// Errors fatal to a whole crawl call. Anything per-URL lives in
/// [`FetchError`] and is absorbed by the worker loop.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid root URL '{0}': must be an absolute URL with scheme and host")]
    InvalidUrl(String),

    #[error("could not authorize caller")]
    Unauthorized,

    #[error("crawl run failed: {0}")]
    Run(String),
}

/// Per-URL fetch failures. Recoverable via retry; exhausted retries degrade
/// to a logged failure result, never a run abort.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out loading page after {0:?}")]
    Timeout(Duration),

    #[error("redirect while loading {0}")]
    Redirect(String),

    #[error("access forbidden: possible IP ban or rate limiting")]
    AccessDenied,

    #[error("too many requests: rate limit exceeded")]
    RateLimited,

    #[error("unauthorized: authentication failed")]
    Auth,

    #[error("server error ({0}): target site experiencing issues")]
    Server(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("invalid page: {0}")]
    InvalidPage(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Identity/proxy acquisition failures. Fatal to one fetch attempt only.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("no usable proxy identity available")]
    NoIdentityAvailable,

    #[error("proxy source '{name}' failed: {reason}")]
    Source { name: String, reason: String },

    #[error("identity ledger error: {0}")]
    Ledger(String),
}

/// PageStore write failure. Fails the task, not the run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("page store write failed: {0}")]
    Write(String),

    #[error("page store unavailable: {0}")]
    Connection(String),
}

/// Session file I/O failure. Degrades to skipping session continuity.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read session file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to write session file {path}: {reason}")]
    Write { path: String, reason: String },
}

impl FetchError {
    /// Classify an HTTP navigation status the way the response handler in the
    /// browser layer reports it. Returns `None` for statuses that are fine.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            300..=399 => Some(FetchError::Redirect(format!("status {status}"))),
            401 => Some(FetchError::Auth),
            403 => Some(FetchError::AccessDenied),
            429 => Some(FetchError::RateLimited),
            500..=599 => Some(FetchError::Server(status)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_failure_names_the_failing_source() {
        let e = IdentityError::Source {
            name: "provider-api".to_string(),
            reason: "HTTP status 503".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "proxy source 'provider-api' failed: HTTP status 503"
        );
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            FetchError::from_status(301),
            Some(FetchError::Redirect(_))
        ));
        assert!(matches!(FetchError::from_status(401), Some(FetchError::Auth)));
        assert!(matches!(
            FetchError::from_status(403),
            Some(FetchError::AccessDenied)
        ));
        assert!(matches!(
            FetchError::from_status(429),
            Some(FetchError::RateLimited)
        ));
        assert!(matches!(
            FetchError::from_status(503),
            Some(FetchError::Server(503))
        ));
        assert!(FetchError::from_status(200).is_none());
        assert!(FetchError::from_status(404).is_none());
    }
}
