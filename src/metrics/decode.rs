//! Decoding of Prometheus `api/v1/query` instant-vector responses.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{CallKey, Sample};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    result_type: String,
    result: serde_json::Value,
}

/// `{"metric": {...}, "value": [<unix ts>, "<value>"]}`
#[derive(Debug, Deserialize)]
struct VectorElement {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: (f64, String),
}

/// Parse a raw response body into samples, preserving backend order.
/// NaN values are kept here; filtering is the fetcher's job.
pub fn decode_samples(body: &[u8]) -> Result<Vec<Sample>> {
    let resp: QueryResponse = serde_json::from_slice(body)
        .map_err(|e| Error::decode_with("malformed response body", e))?;

    if resp.status != "success" {
        return Err(Error::decode(format!(
            "status {:?} ({}): {}",
            resp.status,
            resp.error_type.as_deref().unwrap_or("unknown"),
            resp.error.as_deref().unwrap_or("no error message"),
        )));
    }

    let data = resp
        .data
        .ok_or_else(|| Error::decode("response has no data"))?;
    if data.result_type != "vector" {
        return Err(Error::decode(format!(
            "unexpected result type {:?}, want \"vector\"",
            data.result_type
        )));
    }

    let elements: Vec<VectorElement> = serde_json::from_value(data.result)
        .map_err(|e| Error::decode_with("malformed vector result", e))?;

    elements.into_iter().map(into_sample).collect()
}

fn into_sample(element: VectorElement) -> Result<Sample> {
    let VectorElement { mut metric, value: (_, raw) } = element;

    let value = raw
        .parse::<f64>()
        .map_err(|e| Error::decode_with(format!("sample value {raw:?}"), e))?;

    // Missing identity labels read as empty, same as the backend's own semantics.
    let mut take = |name: &str| metric.remove(name).unwrap_or_default();
    let key = CallKey {
        resource: take("resource"),
        subresource: take("subresource"),
        verb: take("verb"),
        scope: take("scope"),
    };

    Ok(Sample {
        key,
        labels: metric,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_vector_with_residual_labels() {
        let body = br#"{
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {"metric": {"resource": "pods", "subresource": "status", "verb": "PATCH",
                                "scope": "namespace", "quantile": "0.99"},
                     "value": [1700000000.123, "0.042"]},
                    {"metric": {"resource": "nodes", "verb": "LIST", "scope": "cluster"},
                     "value": [1700000000.123, "12"]}
                ]
            }
        }"#;

        let samples = decode_samples(body).unwrap();
        assert_eq!(samples.len(), 2);

        assert_eq!(samples[0].key, CallKey::new("pods", "status", "PATCH", "namespace"));
        assert_eq!(samples[0].label("quantile"), Some("0.99"));
        assert!(samples[0].label("resource").is_none());
        assert!((samples[0].value - 0.042).abs() < 1e-12);

        assert_eq!(samples[1].key.subresource, "");
        assert!(samples[1].labels.is_empty());
        assert_eq!(samples[1].value, 12.0);
    }

    #[test]
    fn special_float_values_parse() {
        let body = br#"{"status":"success","data":{"resultType":"vector","result":[
            {"metric":{},"value":[1,"NaN"]},
            {"metric":{},"value":[1,"+Inf"]}
        ]}}"#;

        let samples = decode_samples(body).unwrap();
        assert!(samples[0].value.is_nan());
        assert!(samples[1].value.is_infinite());
    }

    #[test]
    fn error_status_is_a_decode_error() {
        let body = br#"{"status":"error","errorType":"bad_data","error":"parse error at char 3"}"#;
        let err = decode_samples(body).unwrap_err();
        match err {
            Error::Decode { reason, source } => {
                assert!(reason.contains("bad_data"));
                assert!(reason.contains("parse error at char 3"));
                assert!(source.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn matrix_result_is_rejected() {
        let body = br#"{"status":"success","data":{"resultType":"matrix","result":[]}}"#;
        assert!(matches!(decode_samples(body), Err(Error::Decode { .. })));
    }

    #[test]
    fn malformed_body_is_rejected() {
        let err = decode_samples(b"<html>502</html>").unwrap_err();
        let source = std::error::Error::source(&err).expect("json error kept as source");
        assert!(source.downcast_ref::<serde_json::Error>().is_some());

        let bad_value = br#"{"status":"success","data":{"resultType":"vector","result":[
            {"metric":{},"value":[1,"fast"]}]}}"#;
        let err = decode_samples(bad_value).unwrap_err();
        let source = std::error::Error::source(&err).expect("float error kept as source");
        assert!(source.is::<std::num::ParseFloatError>());
    }

    #[test]
    fn empty_vector_is_fine() {
        let body = br#"{"status":"success","data":{"resultType":"vector","result":[]}}"#;
        assert!(decode_samples(body).unwrap().is_empty());
    }
}
