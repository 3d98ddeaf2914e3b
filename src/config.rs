use std::collections::HashSet;
use std::time::Duration;

use crate::error::{Error, Result};

// ─── Defaults ────────────────────────────────────────────────────

/// kubectl-proxy path to the in-cluster Prometheus service.
pub const DEFAULT_PROMETHEUS_URL: &str =
    "http://127.0.0.1:8001/api/v1/namespaces/monitoring/services/http:prometheus-k8s:9090/proxy";

const DEFAULT_API_CALL_THRESHOLD: Duration = Duration::from_secs(1);
const DEFAULT_LIST_CALL_THRESHOLD: Duration = Duration::from_secs(5);
const DEFAULT_CLUSTER_LIST_CALL_THRESHOLD: Duration = Duration::from_secs(30);

/// The upstream latency recording rule is a 5 minute rolling aggregation.
const DEFAULT_LATENCY_WINDOW: Duration = Duration::from_secs(5 * 60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Upper bound for the poll interval and timeout.
const MAX_POLL_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

// ─── Public types ────────────────────────────────────────────────

/// Latency budgets per call shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub api_call: Duration,
    pub list_call: Duration,
    pub cluster_scope_list_call: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            api_call: DEFAULT_API_CALL_THRESHOLD,
            list_call: DEFAULT_LIST_CALL_THRESHOLD,
            cluster_scope_list_call: DEFAULT_CLUSTER_LIST_CALL_THRESHOLD,
        }
    }
}

/// Retry cadence for a single backend query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Resources and verbs whose samples are noise for the SLO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnorePolicy {
    pub resources: HashSet<String>,
    pub verbs: HashSet<String>,
}

impl IgnorePolicy {
    pub fn is_ignored(&self, resource: &str, verb: &str) -> bool {
        self.resources.contains(resource) || self.verbs.contains(verb)
    }
}

impl Default for IgnorePolicy {
    fn default() -> Self {
        Self {
            resources: ["events"].into_iter().map(String::from).collect(),
            // Non-capitalized "proxy" shows up too.
            verbs: ["WATCH", "WATCHLIST", "PROXY", "proxy", "CONNECT"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub prometheus_url: String,
    pub thresholds: Thresholds,
    pub poll: PollConfig,
    pub latency_window: Duration,
    pub ignore: IgnorePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prometheus_url: DEFAULT_PROMETHEUS_URL.to_string(),
            thresholds: Thresholds::default(),
            poll: PollConfig::default(),
            latency_window: DEFAULT_LATENCY_WINDOW,
            ignore: IgnorePolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(url) = lookup("PROMETHEUS_URL") {
            cfg.prometheus_url = url.trim_end_matches('/').to_string();
        }

        let millis = |key: &str, fallback: Duration| -> Result<Duration> {
            parse_u64(&lookup, key).map(|v| v.map_or(fallback, Duration::from_millis))
        };
        let secs = |key: &str, fallback: Duration| -> Result<Duration> {
            parse_u64(&lookup, key).map(|v| v.map_or(fallback, Duration::from_secs))
        };

        cfg.thresholds = Thresholds {
            api_call: millis("API_CALL_THRESHOLD_MS", cfg.thresholds.api_call)?,
            list_call: millis("API_LIST_CALL_THRESHOLD_MS", cfg.thresholds.list_call)?,
            cluster_scope_list_call: millis(
                "API_CLUSTER_LIST_CALL_THRESHOLD_MS",
                cfg.thresholds.cluster_scope_list_call,
            )?,
        };
        cfg.poll = PollConfig {
            interval: secs("QUERY_POLL_INTERVAL_SECS", cfg.poll.interval)?,
            timeout: secs("QUERY_POLL_TIMEOUT_SECS", cfg.poll.timeout)?,
        };
        cfg.latency_window = secs("LATENCY_WINDOW_SECS", cfg.latency_window)?;

        if cfg.poll.interval.is_zero() {
            return Err(Error::InvalidArgument(
                "QUERY_POLL_INTERVAL_SECS must be positive".into(),
            ));
        }
        for (key, value) in [
            ("QUERY_POLL_INTERVAL_SECS", cfg.poll.interval),
            ("QUERY_POLL_TIMEOUT_SECS", cfg.poll.timeout),
        ] {
            if value > MAX_POLL_DURATION {
                return Err(Error::InvalidArgument(format!(
                    "{key} must be at most {}",
                    MAX_POLL_DURATION.as_secs()
                )));
            }
        }
        Ok(cfg)
    }
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| Error::InvalidArgument(format!("{key}={raw:?}: {e}"))),
    }
}
