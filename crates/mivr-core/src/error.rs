//! Error taxonomy for the feedback core.
//!
//! Every failure the core can report maps to one of the variants below. The
//! variants also encode the propagation policy: entropy errors are skipped at
//! the call site, a first-connection failure switches feedback off for the
//! rest of the run, and exchange failures heal on the next iteration.

use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

/// Which histogram of a pair an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistogramRole {
    /// The primary histogram (`A`, the rendered frame in the driver).
    Primary,
    /// The secondary histogram (`B`, the raw volume in the driver).
    Secondary,
}

impl fmt::Display for HistogramRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// Why a single peer exchange was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeFailure {
    /// Re-establishing the connection failed after feedback had already worked.
    Connect(String),
    /// Writing the metric record failed.
    Write(String),
    /// Reading the reply failed (including read timeouts).
    Read(String),
    /// The peer closed the connection before sending anything.
    Closed,
    /// Fewer bytes arrived than the fixed-width record needs.
    Truncated { expected: usize, actual: usize },
}

impl fmt::Display for ExchangeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "reconnect failed: {e}"),
            Self::Write(e) => write!(f, "write failed: {e}"),
            Self::Read(e) => write!(f, "recv failed: {e}"),
            Self::Closed => write!(f, "peer closed the connection without replying"),
            Self::Truncated { expected, actual } => {
                write!(f, "truncated record: expected {expected} bytes, got {actual}")
            }
        }
    }
}

/// Errors produced by the feedback core.
#[derive(Debug, Error)]
pub enum Error {
    /// A histogram with a zero total cannot be normalized.
    #[error("degenerate distribution: {0} histogram has a total count of zero")]
    DegenerateDistribution(HistogramRole),

    /// Joint quantities need histograms with the same number of bins.
    #[error("bin count mismatch: {primary} vs {secondary}")]
    BinCountMismatch { primary: usize, secondary: usize },

    /// The very first connection to the advisory peer failed.
    #[error("advisory peer {addr} unavailable: {source}")]
    ConnectionUnavailable {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Feedback was permanently disabled earlier in this run.
    #[error("feedback is disabled for the rest of this run")]
    FeedbackDisabled,

    /// A single exchange with the peer failed; the next iteration retries.
    #[error("exchange failed: {0}")]
    ExchangeFailed(ExchangeFailure),

    /// Appending to the sweep log failed.
    #[error("failed to write sweep log {path}: {source}")]
    LogWriteFailure {
        path: String,
        #[source]
        source: io::Error,
    },

    /// A histogram could not be built from its input.
    #[error("invalid histogram: {0}")]
    InvalidHistogram(String),

    /// Configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O outside the peer connection and the sweep log.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Errors after which the loop simply moves on to the next iteration.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DegenerateDistribution(_)
                | Self::BinCountMismatch { .. }
                | Self::ExchangeFailed(_)
                | Self::FeedbackDisabled
        )
    }

    /// Whether this error switches feedback off for the rest of the run.
    pub fn disables_feedback(&self) -> bool {
        matches!(self, Self::ConnectionUnavailable { .. })
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entropy_errors_are_recoverable() {
        assert!(Error::DegenerateDistribution(HistogramRole::Primary).is_recoverable());
        assert!(
            Error::BinCountMismatch {
                primary: 3,
                secondary: 5
            }
            .is_recoverable()
        );
    }

    #[test]
    fn first_connection_failure_disables_feedback() {
        let err = Error::ConnectionUnavailable {
            addr: "127.0.0.1:8888".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert!(err.disables_feedback());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn exchange_failure_is_transient() {
        let err = Error::ExchangeFailed(ExchangeFailure::Closed);
        assert!(err.is_recoverable());
        assert!(!err.disables_feedback());
    }

    #[test]
    fn log_failure_is_fatal_to_the_sweep() {
        let err = Error::LogWriteFailure {
            path: "ValidationData.csv".to_string(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn display_truncated() {
        let f = ExchangeFailure::Truncated {
            expected: 12,
            actual: 4,
        };
        assert_eq!(f.to_string(), "truncated record: expected 12 bytes, got 4");
    }
}
