use std::time::Duration;

use crate::config::Thresholds;
use crate::report::CallAggregate;

/// Latency budget for a call, chosen by its verb/scope shape.
/// LIST calls get a looser budget, cluster-scoped LIST calls the loosest.
pub fn latency_threshold(thresholds: &Thresholds, call: &CallAggregate) -> Duration {
    let is_list_call = call.key.verb == "LIST";
    let is_cluster_scoped = call.key.scope == "cluster";

    match (is_list_call, is_cluster_scoped) {
        (true, true) => thresholds.cluster_scope_list_call,
        (true, false) => thresholds.list_call,
        (false, _) => thresholds.api_call,
    }
}
