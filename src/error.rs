use std::fmt;
use std::num::ParseFloatError;
use std::time::Duration;

use thiserror::Error;

use crate::metrics::CallKey;
use crate::report::Summary;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a [`QueryExecutor`](crate::prometheus_client::QueryExecutor).
/// Only transport / query-level problems end up here.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("no response before the poll deadline ({0:?})")]
    DeadlineExceeded(Duration),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The query kept failing until the poll timeout ran out.
    #[error("query error after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: QueryError,
    },

    #[error("http client setup: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("extracting error: {reason}")]
    Decode {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("summary serialization: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid quantile label {value:?}: {source}")]
    Parse {
        value: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("{0}")]
    MetricViolation(Box<MetricViolation>),
}

impl Error {
    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        Error::Decode {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn decode_with<E>(reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Decode {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_metric_violation(&self) -> bool {
        matches!(self, Error::MetricViolation(_))
    }

    /// The summary that is still usable despite the error.
    /// Only a metric violation produces one.
    pub fn summary(&self) -> Option<&Summary> {
        match self {
            Error::MetricViolation(v) => Some(&v.summary),
            _ => None,
        }
    }
}

/// One call whose p99 latency went over its budget.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub key: CallKey,
    pub perc99: Duration,
    pub threshold: Duration,
    pub count: u64,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "got: {} perc99={:?} count={}; expected perc99 <= {:?}",
            self.key, self.perc99, self.count, self.threshold
        )
    }
}

/// Recoverable verdict: the report is valid, some calls were too slow.
#[derive(Debug)]
pub struct MetricViolation {
    pub violations: Vec<Violation>,
    pub summary: Summary,
}

impl fmt::Display for MetricViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "top latency metric: there should be no high-latency requests, but: ["
        )?;
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str("]")
    }
}
