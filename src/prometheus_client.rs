use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::error::{Error, QueryError};

/// Executes an instant query against the metrics backend and hands back
/// the raw response body.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn query(&self, query: &str, at: DateTime<Utc>) -> Result<Vec<u8>, QueryError>;
}

/// HTTP client for a Prometheus reachable at `base_url`, typically through
/// the apiserver's service proxy.
///
/// `reqwest::Client` is cheaply cloneable and pools connections internally.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    http: reqwest::Client,
    query_url: String,
}

impl PrometheusClient {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(Error::HttpClient)?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            query_url: format!("{}/api/v1/query", base_url.trim_end_matches('/')),
        }
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }
}

#[async_trait]
impl QueryExecutor for PrometheusClient {
    async fn query(&self, query: &str, at: DateTime<Utc>) -> Result<Vec<u8>, QueryError> {
        let time = at.to_rfc3339_opts(SecondsFormat::Secs, true);
        debug!(%query, %time, "prometheus instant query");

        let resp = self
            .http
            .get(&self.query_url)
            .query(&[("query", query), ("time", time.as_str())])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_url_is_joined_once() {
        let client = PrometheusClient::new("http://127.0.0.1:9090/").unwrap();
        assert_eq!(client.query_url(), "http://127.0.0.1:9090/api/v1/query");

        let proxied = PrometheusClient::new(
            "http://127.0.0.1:8001/api/v1/namespaces/monitoring/services/http:prometheus-k8s:9090/proxy",
        )
        .unwrap();
        assert!(proxied
            .query_url()
            .ends_with("http:prometheus-k8s:9090/proxy/api/v1/query"));
    }
}
