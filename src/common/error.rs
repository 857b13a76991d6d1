//! Error types for ksck

use crate::ksck::checksum::ChecksumReport;
use crate::ksck::consistency::ConsistencyIssue;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Cluster Errors ===
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Node {node} unavailable: {reason}")]
    Unavailable { node: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already present: {0}")]
    AlreadyPresent(String),

    #[error("Not leader: {0}")]
    NotLeader(String),

    // === Check Errors ===
    #[error("{} inconsistent tablet(s): {}", .issues.len(), join_issues(.issues))]
    Inconsistent { issues: Vec<ConsistencyIssue> },

    #[error("{0}")]
    ChecksumFailed(Box<ChecksumReport>),

    #[error("Scan failed: {0}")]
    ScanError(String),

    #[error("Timed out: {0}")]
    TimedOut(String),

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(String),

    // === Config Errors ===
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

fn join_issues(issues: &[ConsistencyIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// JSON body carried by every failed RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub error: String,
}

impl Error {
    /// Is this a condition a caller may retry after re-fetching topology?
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Inconsistent { issues } => issues.iter().all(|i| i.is_retryable()),
            Error::TimedOut(_)
            | Error::ConnectionFailed(_)
            | Error::Unavailable { .. }
            | Error::NotLeader(_) => true,
            _ => false,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Error::TimedOut(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Stable machine-readable code used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::AlreadyPresent(_) => "already_present",
            Error::NotLeader(_) => "not_leader",
            Error::TimedOut(_) => "timed_out",
            Error::Unavailable { .. } | Error::ConnectionFailed(_) => "unavailable",
            Error::InvalidArgument(_) | Error::InvalidConfig(_) => "invalid_argument",
            Error::ScanError(_) => "scan_error",
            _ => "internal",
        }
    }

    /// Rebuild an error received from a remote node
    pub fn from_remote(node: &str, body: ErrorBody) -> Self {
        let msg = body.error;
        match body.code.as_str() {
            "not_found" => Error::NotFound(msg),
            "already_present" => Error::AlreadyPresent(msg),
            "not_leader" => Error::NotLeader(msg),
            "timed_out" => Error::TimedOut(msg),
            "unavailable" => Error::Unavailable {
                node: node.to_string(),
                reason: msg,
            },
            "invalid_argument" => Error::InvalidArgument(msg),
            "scan_error" => Error::ScanError(msg),
            _ => Error::Http(format!("{}: {}", node, msg)),
        }
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyPresent(_) | Error::NotLeader(_) => StatusCode::CONFLICT,
            Error::InvalidArgument(_) | Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::TimedOut(_) => StatusCode::REQUEST_TIMEOUT,
            Error::Unavailable { .. } | Error::ConnectionFailed(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code().to_string(),
            error: self.to_string(),
        };
        (self.to_http_status(), axum::Json(body)).into_response()
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::TimedOut(e.to_string())
        } else if e.is_connect() {
            Error::ConnectionFailed(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Internal(format!("encode error: {}", e))
    }
}

// Implement From for common error types
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_round_trip_keeps_kind() {
        let err = Error::NotLeader("tablet t1".into());
        let body = ErrorBody {
            code: err.code().to_string(),
            error: err.to_string(),
        };
        assert!(matches!(
            Error::from_remote("ts-1", body),
            Error::NotLeader(_)
        ));

        let body = ErrorBody {
            code: "unavailable".into(),
            error: "shutting down".into(),
        };
        match Error::from_remote("ts-2", body) {
            Error::Unavailable { node, .. } => assert_eq!(node, "ts-2"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_retryable_inconsistency() {
        let soft = Error::Inconsistent {
            issues: vec![ConsistencyIssue::NoLeader {
                tablet_id: "t1".into(),
            }],
        };
        assert!(soft.is_retryable());

        let hard = Error::Inconsistent {
            issues: vec![
                ConsistencyIssue::NoLeader {
                    tablet_id: "t1".into(),
                },
                ConsistencyIssue::MultipleLeaders {
                    tablet_id: "t2".into(),
                    leaders: vec!["a".into(), "b".into()],
                },
            ],
        };
        assert!(!hard.is_retryable());
        assert!(hard.to_string().contains("t2"));
    }

    #[test]
    fn test_http_status() {
        assert_eq!(
            Error::NotFound("x".into()).to_http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::TimedOut("x".into()).to_http_status(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert!(!Error::ScanError("x".into()).is_retryable());
    }
}
