//! Latency SLO evaluation for API-server calls, driven by Prometheus samples.
//!
//! The flow is: [`ApiResponsivenessMeasurement::start`] marks the run origin,
//! [`ApiResponsivenessMeasurement::gather`] fetches latency-quantile and
//! request-count samples, merges them per (resource, subresource, verb, scope),
//! ranks the result and checks each call against its latency budget.

pub mod config;
pub mod error;
pub mod measurement;
pub mod metrics;
pub mod prometheus_client;
pub mod report;
pub mod threshold;

#[cfg(test)]
mod testing;

pub use config::{Config, IgnorePolicy, PollConfig, Thresholds};
pub use error::{Error, MetricViolation, QueryError, Result, Violation};
pub use measurement::{Action, ApiResponsivenessMeasurement, MeasurementConfig, MEASUREMENT_NAME};
pub use metrics::{CallKey, LatencyQuantiles, Sample};
pub use prometheus_client::{PrometheusClient, QueryExecutor};
pub use report::{CallAggregate, Report, Summary};
