//! In-crate test doubles for the metrics backend.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::QueryError;
use crate::prometheus_client::QueryExecutor;

type Responder = Box<dyn Fn(&str) -> Result<Vec<u8>, QueryError> + Send + Sync>;

/// Replays queued responses, then falls back to a per-query responder.
pub(crate) struct ScriptedExecutor {
    queued: Mutex<VecDeque<Result<Vec<u8>, QueryError>>>,
    responder: Responder,
    seen: Mutex<Vec<(String, DateTime<Utc>)>>,
    delay: Duration,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::responding(|q| Err(QueryError::Unavailable(format!("no scripted response for {q}"))))
    }

    pub(crate) fn failing<F>(make_err: F) -> Self
    where
        F: Fn() -> QueryError + Send + Sync + 'static,
    {
        Self::responding(move |_| Err(make_err()))
    }

    pub(crate) fn responding<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<u8>, QueryError> + Send + Sync + 'static,
    {
        Self {
            queued: Mutex::new(VecDeque::new()),
            responder: Box::new(responder),
            seen: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    /// Every query takes `delay` before answering.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn push_ok(&self, body: Vec<u8>) {
        self.queued.lock().push_back(Ok(body));
    }

    pub(crate) fn push_err(&self, err: QueryError) {
        self.queued.lock().push_back(Err(err));
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().len()
    }

    pub(crate) fn queries(&self) -> Vec<(String, DateTime<Utc>)> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn query(&self, query: &str, at: DateTime<Utc>) -> Result<Vec<u8>, QueryError> {
        self.seen.lock().push((query.to_string(), at));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.queued.lock().pop_front();
        match next {
            Some(resp) => resp,
            None => (self.responder)(query),
        }
    }
}

/// One instant-vector element.
pub(crate) fn sample(labels: &[(&str, &str)], value: &str) -> serde_json::Value {
    let metric: serde_json::Map<String, serde_json::Value> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
        .collect();
    serde_json::json!({ "metric": metric, "value": [1700000000.0, value] })
}

/// A successful `api/v1/query` response body.
pub(crate) fn vector_body(result: Vec<serde_json::Value>) -> Vec<u8> {
    serde_json::json!({
        "status": "success",
        "data": { "resultType": "vector", "result": result },
    })
    .to_string()
    .into_bytes()
}
