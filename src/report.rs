use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::metrics::{CallKey, LatencyQuantiles};

/// Combined latency + count statistics for one call family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallAggregate {
    #[serde(flatten)]
    pub key: CallKey,
    pub latency: LatencyQuantiles,
    pub count: u64,
}

impl CallAggregate {
    pub fn new(key: CallKey) -> Self {
        Self {
            key,
            latency: LatencyQuantiles::new(),
            count: 0,
        }
    }

    /// Ranking order: p99 descending, then identity and count ascending.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .latency
            .perc99()
            .cmp(&self.latency.perc99())
            .then_with(|| self.key.cmp(&other.key))
            .then_with(|| self.count.cmp(&other.count))
    }
}

/// Ranked result of one gather.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub api_calls: Vec<CallAggregate>,
}

impl Report {
    /// Build a report, ordered slowest first.
    pub fn ranked(mut api_calls: Vec<CallAggregate>) -> Self {
        api_calls.sort_by(CallAggregate::rank_cmp);
        Self { api_calls }
    }

    pub fn len(&self) -> usize {
        self.api_calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.api_calls.is_empty()
    }
}

/// Named, timestamped result handed back to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub name: String,
    pub ext: String,
    pub time: DateTime<Utc>,
    pub content: Report,
}

impl Summary {
    pub fn new(name: impl Into<String>, time: DateTime<Utc>, content: Report) -> Self {
        Self {
            name: name.into(),
            ext: "json".into(),
            time,
            content,
        }
    }

    /// Pretty-printed payload, i.e. what gets written to `<name>.json`.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.content).map_err(Error::Serialize)
    }
}
