//! Error taxonomy shared by every core module.
//!
//! Network failures are retried inside the fetcher and only surface once the
//! retry budget is spent. Cache failures are never fatal: callers log them and
//! fall through to the network. Engine-facing operations tag failures with the
//! [`Stage`] that produced them.

use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Engine pipeline stage a query failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Instantiate,
    RegisterFile,
    DropTable,
    CreateTable,
    VerifyTable,
    DescribeSchema,
    Query,
    ConvertRows,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instantiate => "instantiate",
            Self::RegisterFile => "register-file",
            Self::DropTable => "drop-table",
            Self::CreateTable => "create-table",
            Self::VerifyTable => "verify-table",
            Self::DescribeSchema => "describe-schema",
            Self::Query => "query",
            Self::ConvertRows => "convert-rows",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a network failure, stable across retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Timeout,
    HttpStatus(u16),
    Connection,
    Body,
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("connection to {url} failed: {message}")]
    Connection { url: String, message: String },
    #[error("reading body from {url} failed: {message}")]
    Body { url: String, message: String },
    #[error("giving up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<NetworkError>,
    },
}

impl NetworkError {
    /// Classified reason; for `Exhausted` this is the reason of the last attempt.
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Timeout { .. } => FailureReason::Timeout,
            Self::Status { status, .. } => FailureReason::HttpStatus(*status),
            Self::Connection { .. } => FailureReason::Connection,
            Self::Body { .. } => FailureReason::Body,
            Self::Exhausted { last, .. } => last.reason(),
        }
    }

    pub(crate) fn from_reqwest(url: &str, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                timeout_secs,
            }
        } else if let Some(status) = err.status() {
            Self::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else if err.is_body() || err.is_decode() {
            Self::Body {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::Connection {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("metadata store: {0}")]
    Metadata(#[from] rusqlite::Error),
    #[error("payload store: {0}")]
    Io(#[from] std::io::Error),
    #[error("no cache entry for {key}")]
    Missing { key: String },
    #[error("metadata for {key} exists but the payload is missing")]
    PayloadMissing { key: String },
    #[error("entry for {key} is inconsistent: {detail}")]
    Inconsistent { key: String, detail: String },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(#[from] NetworkError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("engine initialization failed: {0}")]
    EngineInit(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("[{stage}] {message}")]
    Query { stage: Stage, message: String },
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    pub fn query(stage: Stage, err: impl fmt::Display) -> Self {
        Self::Query {
            stage,
            message: err.to_string(),
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Query { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_keeps_last_reason() {
        let err = NetworkError::Exhausted {
            attempts: 3,
            last: Box::new(NetworkError::Status {
                url: "http://x".into(),
                status: 503,
            }),
        };
        assert_eq!(err.reason(), FailureReason::HttpStatus(503));
        assert!(err.to_string().contains("3 attempts"));
    }

    #[test]
    fn test_query_error_is_tagged() {
        let err = Error::query(Stage::CreateTable, "boom");
        assert_eq!(err.stage(), Some(Stage::CreateTable));
        assert_eq!(err.to_string(), "[create-table] boom");
    }
}
