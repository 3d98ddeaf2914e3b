use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use super::{CallKey, Sample};
use crate::config::IgnorePolicy;
use crate::error::{Error, Result};
use crate::report::CallAggregate;

/// Merges the latency-quantile stream and the request-count stream into
/// one [`CallAggregate`] per [`CallKey`].
#[derive(Debug, Clone, Default)]
pub struct CallAggregator {
    ignore: IgnorePolicy,
}

impl CallAggregator {
    pub fn new(ignore: IgnorePolicy) -> Self {
        Self { ignore }
    }

    /// Latency samples are applied before counts and in input order, so a
    /// repeated (key, quantile) pair keeps the last value seen.
    /// Output order is unspecified.
    pub fn aggregate(
        &self,
        latency_samples: &[Sample],
        count_samples: &[Sample],
    ) -> Result<Vec<CallAggregate>> {
        let mut table = CallTable::default();

        for sample in latency_samples {
            let raw = sample.label("quantile").unwrap_or_default();
            let quantile = raw.parse::<f64>().map_err(|source| Error::Parse {
                value: raw.to_string(),
                source,
            })?;
            if self.is_ignored(&sample.key) {
                continue;
            }
            table.add_latency(&sample.key, quantile, seconds_to_duration(sample.value));
        }

        for sample in count_samples {
            if self.is_ignored(&sample.key) {
                continue;
            }
            table.add_count(&sample.key, round_count(sample.value));
        }

        debug!(
            latency_samples = latency_samples.len(),
            count_samples = count_samples.len(),
            calls = table.calls.len(),
            "aggregated api calls"
        );
        Ok(table.calls.into_values().collect())
    }

    fn is_ignored(&self, key: &CallKey) -> bool {
        self.ignore.is_ignored(&key.resource, &key.verb)
    }
}

// ─── Internal state ──────────────────────────────────────────────

#[derive(Default)]
struct CallTable {
    calls: HashMap<String, CallAggregate>,
}

impl CallTable {
    fn entry(&mut self, key: &CallKey) -> &mut CallAggregate {
        self.calls
            .entry(key.metric_key())
            .or_insert_with(|| CallAggregate::new(key.clone()))
    }

    fn add_latency(&mut self, key: &CallKey, quantile: f64, latency: Duration) {
        self.entry(key).latency.set_quantile(quantile, latency);
    }

    /// Zero counts neither create an entry nor clobber an earlier count.
    fn add_count(&mut self, key: &CallKey, count: u64) {
        if count == 0 {
            return;
        }
        self.entry(key).count = count;
    }
}

/// Backend values are fractional seconds. Negative values clamp to zero,
/// +Inf to the largest representable duration.
fn seconds_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

/// Round half away from zero; negative totals count as nothing observed.
fn round_count(value: f64) -> u64 {
    let rounded = value.round();
    if rounded <= 0.0 {
        0
    } else {
        rounded as u64
    }
}
