use std::time::Duration;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Latency per quantile for one call family.
/// Serialized as `{"p50_us": .., "p90_us": .., "p99_us": ..}` into the summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyQuantiles {
    // Kept sorted by quantile.
    entries: Vec<(f64, Duration)>,
}

impl LatencyQuantiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `latency` for `quantile`, replacing any earlier value for it.
    pub fn set_quantile(&mut self, quantile: f64, latency: Duration) {
        match self
            .entries
            .binary_search_by(|(q, _)| q.total_cmp(&quantile))
        {
            Ok(i) => self.entries[i].1 = latency,
            Err(i) => self.entries.insert(i, (quantile, latency)),
        }
    }

    pub fn get(&self, quantile: f64) -> Option<Duration> {
        self.entries
            .binary_search_by(|(q, _)| q.total_cmp(&quantile))
            .ok()
            .map(|i| self.entries[i].1)
    }

    pub fn perc50(&self) -> Duration {
        self.get(0.50).unwrap_or_default()
    }

    pub fn perc90(&self) -> Duration {
        self.get(0.90).unwrap_or_default()
    }

    /// Primary ranking and SLO value; zero when the call had no latency samples.
    pub fn perc99(&self) -> Duration {
        self.get(0.99).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, Duration)> + '_ {
        self.entries.iter().copied()
    }

    pub fn has_data(&self) -> bool {
        !self.entries.is_empty()
    }
}

/// `0.99` → `"p99_us"`, `0.999` → `"p99.9_us"`.
fn field_name(quantile: f64) -> String {
    let pct = (quantile * 100.0 * 1e4).round() / 1e4;
    format!("p{pct}_us")
}

impl Serialize for LatencyQuantiles {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // The three standard quantiles are always present so readers get a stable shape.
        let standard = [0.50, 0.90, 0.99];
        let extra: Vec<_> = self
            .entries
            .iter()
            .filter(|(q, _)| !standard.contains(q))
            .collect();

        let mut map = serializer.serialize_map(Some(standard.len() + extra.len()))?;
        for q in standard {
            let us = self.get(q).unwrap_or_default().as_micros() as u64;
            map.serialize_entry(&field_name(q), &us)?;
        }
        for (q, latency) in extra {
            map.serialize_entry(&field_name(*q), &(latency.as_micros() as u64))?;
        }
        map.end()
    }
}
