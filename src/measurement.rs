use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{error, info};

use crate::config::{Config, Thresholds};
use crate::error::{Error, MetricViolation, Result, Violation};
use crate::metrics::{CallAggregator, Sample, SampleFetcher};
use crate::prometheus_client::QueryExecutor;
use crate::report::{CallAggregate, Report, Summary};
use crate::threshold::latency_threshold;

// ─── Constants ───────────────────────────────────────────────────

pub const MEASUREMENT_NAME: &str = "APIResponsivenessPrometheus";

/// Calls always logged after a gather, violating or not.
const TOP_CALLS_LOGGED: usize = 5;

/// Shortest latency window ever queried.
const MIN_LATENCY_WINDOW: Duration = Duration::from_secs(60);

fn latency_query(window: &str) -> String {
    format!("quantile_over_time(0.99, apiserver:apiserver_request_latency:histogram_quantile[{window}])")
}

fn count_query(window: &str) -> String {
    format!(
        "sum(increase(apiserver_request_latency_seconds_count[{window}])) by (resource, subresource, scope, verb)"
    )
}

/// Window for the latency query: the upstream rule is already a rolling
/// aggregation over `rule_window`, so that much of the run is skipped.
pub fn latency_window(measurement_duration: Duration, rule_window: Duration) -> Duration {
    measurement_duration
        .saturating_sub(rule_window)
        .max(MIN_LATENCY_WINDOW)
}

/// Range selector syntax, whole seconds.
pub fn to_prometheus_time(d: Duration) -> String {
    format!("{}s", d.as_secs())
}

// ─── Host surface ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Gather,
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(Action::Start),
            "gather" => Ok(Action::Gather),
            other => Err(Error::InvalidArgument(format!("unknown action {other}"))),
        }
    }
}

/// Parameters passed by the host on each invocation.
#[derive(Debug, Clone, Default)]
pub struct MeasurementConfig {
    pub params: HashMap<String, serde_json::Value>,
}

impl MeasurementConfig {
    pub fn with_action(action: &str) -> Self {
        let mut params = HashMap::new();
        params.insert("action".to_string(), serde_json::Value::from(action));
        Self { params }
    }

    pub fn get_string(&self, key: &str) -> Result<&str> {
        match self.params.get(key) {
            None => Err(Error::InvalidArgument(format!("missing parameter {key}"))),
            Some(value) => value.as_str().ok_or_else(|| {
                Error::InvalidArgument(format!("parameter {key} is not a string: {value}"))
            }),
        }
    }
}

// ─── Measurement ─────────────────────────────────────────────────

/// API-call latency SLO measurement backed by Prometheus.
///
/// The host owns one instance per test run and calls `start` once, then
/// `gather`. The start time is the only state carried between the two.
pub struct ApiResponsivenessMeasurement<Q> {
    fetcher: SampleFetcher<Q>,
    aggregator: CallAggregator,
    thresholds: Thresholds,
    rule_window: Duration,
    start_time: Mutex<Option<DateTime<Utc>>>,
}

impl<Q: QueryExecutor> ApiResponsivenessMeasurement<Q> {
    pub fn new(executor: Q, config: &Config) -> Self {
        Self {
            fetcher: SampleFetcher::new(executor, config.poll),
            aggregator: CallAggregator::new(config.ignore.clone()),
            thresholds: config.thresholds,
            rule_window: config.latency_window,
            start_time: Mutex::new(None),
        }
    }

    pub fn executor(&self) -> &Q {
        self.fetcher.executor()
    }

    /// Run one host action. A metric violation comes back as an error that
    /// still carries the summary (see [`Error::summary`]).
    pub async fn execute(&self, config: &MeasurementConfig) -> Result<Vec<Summary>> {
        match config.get_string("action")?.parse::<Action>()? {
            Action::Start => {
                self.start();
                Ok(Vec::new())
            }
            Action::Gather => self.gather().await.map(|summary| vec![summary]),
        }
    }

    pub fn start(&self) {
        self.start_at(Utc::now());
    }

    /// Set (or reset) the measurement window origin.
    pub fn start_at(&self, at: DateTime<Utc>) {
        *self.start_time.lock() = Some(at);
        info!(measurement = %self, start = %at, "measurement started");
    }

    pub async fn gather(&self) -> Result<Summary> {
        self.gather_at(Utc::now()).await
    }

    pub async fn gather_at(&self, now: DateTime<Utc>) -> Result<Summary> {
        let start = self.start_time().ok_or_else(|| {
            Error::InvalidArgument(format!("{}: gather called before start", self))
        })?;

        let calls = self.gather_api_calls(start, now).await?;
        let report = Report::ranked(calls);
        let violations = self.check_thresholds(&report);
        let summary = Summary::new(MEASUREMENT_NAME, now, report);

        if violations.is_empty() {
            Ok(summary)
        } else {
            Err(Error::MetricViolation(Box::new(MetricViolation {
                violations,
                summary,
            })))
        }
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        *self.start_time.lock()
    }

    /// Does nothing; present for hosts that always dispose measurements.
    pub fn dispose(&self) {}

    async fn gather_api_calls(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CallAggregate>> {
        let measurement_duration = (end - start).to_std().unwrap_or_default();
        let window = latency_window(measurement_duration, self.rule_window);

        let latency_samples = self
            .fetcher
            .fetch(&latency_query(&to_prometheus_time(window)), end)
            .await
            .map_err(|err| {
                error!(measurement = %self, error = %err, "latency samples gathering error");
                err
            })?;

        let count_samples: Vec<Sample> = match self
            .fetcher
            .fetch(&count_query(&to_prometheus_time(measurement_duration)), end)
            .await
        {
            Ok(samples) => samples,
            Err(err) => {
                error!(measurement = %self, error = %err, "count samples gathering error, continuing without counts");
                Vec::new()
            }
        };

        self.aggregator.aggregate(&latency_samples, &count_samples)
    }

    /// Logs the top calls plus every violation, and returns the violations.
    fn check_thresholds(&self, report: &Report) -> Vec<Violation> {
        let mut violations = Vec::new();

        for (rank, call) in report.api_calls.iter().enumerate() {
            let threshold = latency_threshold(&self.thresholds, call);
            let perc99 = call.latency.perc99();
            let is_bad = perc99 > threshold;

            if rank < TOP_CALLS_LOGGED || is_bad {
                let prefix = if is_bad { "WARNING " } else { "" };
                info!(
                    measurement = %self,
                    resource = %call.key.resource,
                    subresource = %call.key.subresource,
                    verb = %call.key.verb,
                    scope = %call.key.scope,
                    perc50 = ?call.latency.perc50(),
                    perc90 = ?call.latency.perc90(),
                    perc99 = ?perc99,
                    count = call.count,
                    threshold = ?threshold,
                    "{prefix}top latency metric"
                );
            }
            if is_bad {
                violations.push(Violation {
                    key: call.key.clone(),
                    perc99,
                    threshold,
                    count: call.count,
                });
            }
        }
        violations
    }
}

impl<Q> fmt::Display for ApiResponsivenessMeasurement<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MEASUREMENT_NAME)
    }
}
