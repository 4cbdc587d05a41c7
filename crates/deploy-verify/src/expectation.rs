//! Expectation parsing.
//!
//! Expectations arrive as compact strings: `KEY=VALUE` lists for env vars,
//! secret env vars and secret volumes, and JSON objects for params, labels
//! and annotations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Expectation parsing errors.
///
/// A parse error aborts only the check of the category that owns the input.
#[derive(Debug, Error)]
pub enum ExpectationError {
    #[error("Env Vars must be in \"KEY1=VALUE1,KEY2=VALUE2\" format, received {segment}")]
    Format { segment: String },

    #[error("Invalid JSON for {category}: {source}")]
    Json {
        category: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// One expected `name`/`value` pair.
///
/// Secret references are flattened into `value` as `secretName:secretKey`
/// so secret and plain expectations share one comparison shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvVarExpectation {
    pub name: String,
    pub value: String,
}

impl EnvVarExpectation {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Parse a `KEY1=VALUE1,KEY2=VALUE2` list.
///
/// Each segment splits on its first `=`. Order is preserved and duplicate
/// keys are kept.
pub fn parse_env_vars(input: &str) -> Result<Vec<EnvVarExpectation>, ExpectationError> {
    input
        .split(',')
        .map(|segment| {
            segment
                .split_once('=')
                .map(|(name, value)| EnvVarExpectation::new(name, value))
                .ok_or_else(|| ExpectationError::Format {
                    segment: segment.to_string(),
                })
        })
        .collect()
}

/// Sparse resource params expectation.
///
/// Fields keep their JSON type so the matcher compares `80` and `"80"` as
/// different values. A JSON `null` deserializes to `None`.
///
/// Concurrency is read from the misspelled `containerConncurrency` key
/// only. `containerConcurrency` is ignored like any other unknown key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamsExpectation {
    #[serde(rename = "containerConncurrency")]
    pub container_concurrency: Option<Value>,
    pub timeout_seconds: Option<Value>,
    pub cpu: Option<Value>,
    pub memory: Option<Value>,
}

/// False for `null`, `false`, `0` and `""`. Those params are not checked.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl ParamsExpectation {
    /// Expected cpu, rendered as a string.
    ///
    /// Numbers use their JSON rendering, so `2` becomes `"2"` and `0.5`
    /// becomes `"0.5"`.
    pub fn cpu_string(&self) -> Option<String> {
        self.cpu.as_ref().map(|cpu| match cpu {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

pub fn parse_params(input: &str) -> Result<ParamsExpectation, ExpectationError> {
    serde_json::from_str(input).map_err(|source| ExpectationError::Json {
        category: "PARAMS",
        source,
    })
}

/// Parse a JSON object of string values (labels, annotations).
pub fn parse_string_map(
    category: &'static str,
    input: &str,
) -> Result<BTreeMap<String, String>, ExpectationError> {
    serde_json::from_str(input).map_err(|source| ExpectationError::Json { category, source })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_vars_preserves_order() {
        let parsed = parse_env_vars("A=1,B=2").unwrap();
        assert_eq!(
            parsed,
            vec![
                EnvVarExpectation::new("A", "1"),
                EnvVarExpectation::new("B", "2"),
            ]
        );
    }

    #[test]
    fn test_parse_env_vars_splits_on_first_equals() {
        let parsed = parse_env_vars("URL=https://x/?a=b").unwrap();
        assert_eq!(parsed, vec![EnvVarExpectation::new("URL", "https://x/?a=b")]);
    }

    #[test]
    fn test_parse_env_vars_keeps_duplicates() {
        let parsed = parse_env_vars("A=1,A=2").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].value, "1");
        assert_eq!(parsed[1].value, "2");
    }

    #[test]
    fn test_parse_env_vars_allows_empty_value() {
        let parsed = parse_env_vars("EMPTY=").unwrap();
        assert_eq!(parsed, vec![EnvVarExpectation::new("EMPTY", "")]);
    }

    #[test]
    fn test_parse_env_vars_rejects_segment_without_equals() {
        let err = parse_env_vars("A=1,BROKEN,C=3").expect_err("BROKEN lacks '='");
        assert!(matches!(err, ExpectationError::Format { ref segment } if segment == "BROKEN"));
    }

    #[test]
    fn test_parse_env_vars_rejects_trailing_comma() {
        let err = parse_env_vars("A=1,").expect_err("empty segment lacks '='");
        assert!(err.to_string().contains("KEY1=VALUE1,KEY2=VALUE2"));
    }

    #[test]
    fn test_parse_params_sparse() {
        let params = parse_params(r#"{"cpu": 2}"#).unwrap();
        assert_eq!(params.cpu, Some(Value::from(2)));
        assert_eq!(params.cpu_string().as_deref(), Some("2"));
        assert!(params.container_concurrency.is_none());
        assert!(params.timeout_seconds.is_none());
        assert!(params.memory.is_none());
    }

    #[test]
    fn test_parse_params_reads_misspelled_concurrency_only() {
        let params = parse_params(r#"{"containerConncurrency": 80}"#).unwrap();
        assert_eq!(params.container_concurrency, Some(Value::from(80)));

        let params = parse_params(r#"{"containerConcurrency": 10}"#).unwrap();
        assert!(params.container_concurrency.is_none());
    }

    #[test]
    fn test_parse_params_accepts_both_concurrency_spellings() {
        let params =
            parse_params(r#"{"containerConncurrency": 80, "containerConcurrency": 10}"#).unwrap();
        assert_eq!(params.container_concurrency, Some(Value::from(80)));
    }

    #[test]
    fn test_is_truthy() {
        for falsy in [
            Value::Null,
            Value::from(false),
            Value::from(0),
            Value::from(0.0),
            Value::from(""),
        ] {
            assert!(!is_truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy in [Value::from(true), Value::from(1), Value::from("0"), Value::from("1Gi")] {
            assert!(is_truthy(&truthy), "{truthy} should be truthy");
        }
    }

    #[test]
    fn test_parse_params_null_is_absent() {
        let params = parse_params(r#"{"memory": null, "timeoutSeconds": 60}"#).unwrap();
        assert!(params.memory.is_none());
        assert_eq!(params.timeout_seconds, Some(Value::from(60)));
    }

    #[test]
    fn test_cpu_string_coercion() {
        let params = parse_params(r#"{"cpu": "1000m"}"#).unwrap();
        assert_eq!(params.cpu_string().as_deref(), Some("1000m"));

        let params = parse_params(r#"{"cpu": 0.5}"#).unwrap();
        assert_eq!(params.cpu_string().as_deref(), Some("0.5"));
    }

    #[test]
    fn test_parse_params_malformed_json() {
        let err = parse_params("{cpu: 2").expect_err("not JSON");
        assert!(matches!(
            err,
            ExpectationError::Json {
                category: "PARAMS",
                ..
            }
        ));
    }

    #[test]
    fn test_parse_string_map() {
        let labels = parse_string_map("LABELS", r#"{"team": "web", "env": "prod"}"#).unwrap();
        assert_eq!(labels.get("team").map(String::as_str), Some("web"));
        assert_eq!(labels.len(), 2);

        let err = parse_string_map("LABELS", r#"{"team": 1}"#).expect_err("non-string value");
        assert!(err.to_string().starts_with("Invalid JSON for LABELS"));
    }
}
