pub mod collector;
pub mod decode;
pub mod fetcher;
pub mod percentiles;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

pub use collector::CallAggregator;
pub use fetcher::SampleFetcher;
pub use percentiles::LatencyQuantiles;

/// Identity of one API call family as labelled by the apiserver metrics.
/// All four parts are opaque, case-sensitive labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CallKey {
    pub resource: String,
    pub subresource: String,
    pub verb: String,
    pub scope: String,
}

impl CallKey {
    pub fn new(
        resource: impl Into<String>,
        subresource: impl Into<String>,
        verb: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            subresource: subresource.into(),
            verb: verb.into(),
            scope: scope.into(),
        }
    }

    /// Serialized form used as the aggregation map key.
    pub fn metric_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.resource, self.subresource, self.verb, self.scope
        )
    }
}

impl fmt::Display for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{resource: {}, subresource: {}, verb: {}, scope: {}}}",
            self.resource, self.subresource, self.verb, self.scope
        )
    }
}

/// A single instant-vector element returned by the backend.
/// The identity labels are lifted into `key`; everything else stays in `labels`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub key: CallKey,
    /// Residual labels, e.g. `quantile` on latency samples.
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

impl Sample {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}
