use chrono::{DateTime, Utc};
use tokio::time::{self, timeout_at, Instant, MissedTickBehavior};
use tracing::warn;

use super::decode::decode_samples;
use super::Sample;
use crate::config::PollConfig;
use crate::error::{Error, QueryError, Result};
use crate::prometheus_client::QueryExecutor;

/// Runs one instant query, polling until the backend answers or the poll
/// timeout runs out. Only transport/query failures are retried.
pub struct SampleFetcher<Q> {
    executor: Q,
    poll: PollConfig,
}

impl<Q: QueryExecutor> SampleFetcher<Q> {
    pub fn new(executor: Q, poll: PollConfig) -> Self {
        Self { executor, poll }
    }

    pub fn executor(&self) -> &Q {
        &self.executor
    }

    /// Samples for `query` evaluated at `at`, NaN values dropped.
    /// Instants at or before the Unix epoch count as unset.
    pub async fn fetch(&self, query: &str, at: DateTime<Utc>) -> Result<Vec<Sample>> {
        if is_unset(at) {
            return Err(Error::InvalidArgument("query time can't be zero".into()));
        }

        let body = self.poll_query(query, at).await?;
        let samples = decode_samples(&body)?;
        Ok(samples.into_iter().filter(|s| !s.value.is_nan()).collect())
    }

    /// Attempts start on a fixed `interval` cadence; a slow attempt delays
    /// the next one instead of stacking a full interval on top of it.
    /// Nothing runs past `timeout`, including an attempt still in flight.
    async fn poll_query(&self, query: &str, at: DateTime<Utc>) -> Result<Vec<u8>> {
        let PollConfig { interval, timeout } = self.poll;
        if interval.is_zero() {
            return Err(Error::InvalidArgument("poll interval must be positive".into()));
        }
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .filter(|_| now.checked_add(interval).is_some())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "poll interval {interval:?} / timeout {timeout:?} out of range"
                ))
            })?;

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut attempts = 0u32;
        let mut last_err = None;

        loop {
            let ticked = timeout_at(deadline, ticker.tick()).await.is_ok();
            if !ticked || Instant::now() >= deadline {
                break;
            }
            attempts += 1;
            match timeout_at(deadline, self.executor.query(query, at)).await {
                Ok(Ok(body)) => return Ok(body),
                Ok(Err(err)) => {
                    warn!(attempt = attempts, error = %err, %query, "query failed, retrying");
                    last_err = Some(err);
                }
                // Cut short by the deadline.
                Err(_) => break,
            }
        }

        Err(Error::Transport {
            attempts,
            source: last_err.unwrap_or(QueryError::DeadlineExceeded(timeout)),
        })
    }
}

fn is_unset(at: DateTime<Utc>) -> bool {
    at.timestamp() < 0 || (at.timestamp() == 0 && at.timestamp_subsec_nanos() == 0)
}
