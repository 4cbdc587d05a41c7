//! Per-category checks.
//!
//! Each check is a pure function of the configuration and the described
//! service. A check either passes, is skipped because its variables are
//! unset, fails with a [`Mismatch`], or errors because its own expectation
//! input could not be parsed.

use crate::config::{Category, Gate, VerifyConfig};
use crate::expectation::{
    parse_env_vars, parse_params, parse_string_map, EnvVarExpectation, ExpectationError,
};
use crate::manifest::Service;
use crate::matcher::{self, Comparison};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// The expected and actual payloads of a failed category.
///
/// Absent actual values are serialized as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub category: Category,
    pub expected: Value,
    pub actual: Value,
    /// One line per failing position, key or field.
    pub details: Vec<String>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}) mismatch:", self.category, self.category.description())?;
        for detail in &self.details {
            writeln!(f, "  {detail}")?;
        }
        writeln!(f, "expected:\n{}", pretty(&self.expected))?;
        write!(f, "actual:\n{}", pretty(&self.actual))
    }
}

/// Result of one category check.
#[derive(Debug)]
pub enum CheckOutcome {
    Passed,
    Skipped { missing: Vec<&'static str> },
    Failed(Mismatch),
    Errored(ExpectationError),
}

impl CheckOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CheckOutcome::Failed(_) | CheckOutcome::Errored(_))
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn render(value: Option<&Value>) -> String {
    value.map_or_else(|| "<absent>".to_string(), Value::to_string)
}

/// Run one category check against the shared service.
pub fn run_check(category: Category, config: &VerifyConfig, service: &Service) -> CheckOutcome {
    if let Gate::Skip { missing } = config.gate(category) {
        return CheckOutcome::Skipped { missing };
    }

    let result = match category {
        Category::EnvVars => config
            .env
            .as_deref()
            .map(|input| check_named_list(category, input, &matcher::actual_env_vars(service))),
        Category::SecretEnvVars => config.secret_env.as_deref().map(|input| {
            check_named_list(category, input, &matcher::actual_secret_env_vars(service))
        }),
        Category::SecretVolumes => config.secret_volumes.as_deref().map(|input| {
            check_named_list(category, input, &matcher::actual_secret_volumes(service))
        }),
        Category::Params => config
            .params
            .as_deref()
            .map(|input| check_params(input, service)),
        Category::Annotations => config.annotations.as_deref().map(|input| {
            check_string_map(
                category,
                "ANNOTATIONS",
                input,
                matcher::actual_annotations(service),
            )
        }),
        Category::Labels => config.labels.as_deref().map(|input| {
            check_string_map(category, "LABELS", input, matcher::actual_labels(service))
        }),
        Category::Revision => config.revision.as_deref().map(|expected| {
            Ok(check_single(
                category,
                "revision name",
                Value::from(expected),
                matcher::actual_revision_name(service).map(Value::from),
            ))
        }),
        Category::Tag => config.tag.as_deref().map(|expected| {
            Ok(check_single(
                category,
                "traffic tag",
                Value::from(expected),
                matcher::actual_tag(service, expected).map(Value::from),
            ))
        }),
        Category::Traffic => match (config.traffic.as_deref(), config.tag.as_deref()) {
            (Some(expected), Some(tag)) => Some(Ok(check_single(
                category,
                "traffic percent",
                Value::from(expected),
                matcher::actual_traffic_percent(service, tag),
            ))),
            _ => None,
        },
    };

    match result {
        Some(Ok(None)) => CheckOutcome::Passed,
        Some(Ok(Some(mismatch))) => CheckOutcome::Failed(mismatch),
        Some(Err(err)) => CheckOutcome::Errored(err),
        None => CheckOutcome::Skipped {
            missing: category.required_vars().to_vec(),
        },
    }
}

/// Compare a `KEY=VALUE` expectation list against named actual entries.
fn check_named_list(
    category: Category,
    input: &str,
    actual: &[EnvVarExpectation],
) -> Result<Option<Mismatch>, ExpectationError> {
    let expected = parse_env_vars(input)?;
    let subset = matcher::match_by_name(&expected, actual);

    let details: Vec<String> = expected
        .iter()
        .zip(&subset)
        .enumerate()
        .filter_map(|(index, (want, found))| match found {
            Some(found) if found == want => None,
            Some(found) => Some(format!(
                "[{index}] {:?}: expected value {:?}, found {:?}",
                want.name, want.value, found.value
            )),
            None => Some(format!(
                "[{index}] {:?}: expected value {:?}, found <absent>",
                want.name, want.value
            )),
        })
        .collect();

    if details.is_empty() {
        return Ok(None);
    }

    Ok(Some(Mismatch {
        category,
        expected: to_json(&expected),
        actual: to_json(&subset),
        details,
    }))
}

/// Compare a JSON key/value expectation against a projection of the actual map.
fn check_string_map(
    category: Category,
    var: &'static str,
    input: &str,
    actual: Option<&BTreeMap<String, String>>,
) -> Result<Option<Mismatch>, ExpectationError> {
    let expected = parse_string_map(var, input)?;
    let projected = matcher::project_map(&expected, actual);

    let details: Vec<String> = expected
        .iter()
        .filter_map(|(key, want)| match projected.get(key) {
            Some(Some(found)) if found == want => None,
            Some(Some(found)) => Some(format!("{key:?}: expected {want:?}, found {found:?}")),
            _ => Some(format!("{key:?}: expected {want:?}, found <absent>")),
        })
        .collect();

    if details.is_empty() {
        return Ok(None);
    }

    Ok(Some(Mismatch {
        category,
        expected: to_json(&expected),
        actual: to_json(&projected),
        details,
    }))
}

fn check_params(input: &str, service: &Service) -> Result<Option<Mismatch>, ExpectationError> {
    let expected = parse_params(input)?;
    let comparisons = matcher::compare_params(&expected, service);

    let details: Vec<String> = comparisons
        .iter()
        .filter(|c| !c.is_match())
        .map(describe_comparison)
        .collect();

    if details.is_empty() {
        return Ok(None);
    }

    let mut expected_fields = serde_json::Map::new();
    let mut actual_fields = serde_json::Map::new();
    for comparison in &comparisons {
        expected_fields.insert(comparison.field.to_string(), comparison.expected.clone());
        actual_fields.insert(
            comparison.field.to_string(),
            comparison.actual.clone().unwrap_or(Value::Null),
        );
    }

    Ok(Some(Mismatch {
        category: Category::Params,
        expected: Value::Object(expected_fields),
        actual: Value::Object(actual_fields),
        details,
    }))
}

fn check_single(
    category: Category,
    field: &'static str,
    expected: Value,
    actual: Option<Value>,
) -> Option<Mismatch> {
    let comparison = Comparison {
        field,
        expected,
        actual,
    };

    if comparison.is_match() {
        return None;
    }

    Some(Mismatch {
        category,
        details: vec![describe_comparison(&comparison)],
        expected: comparison.expected,
        actual: comparison.actual.unwrap_or(Value::Null),
    })
}

fn describe_comparison(comparison: &Comparison) -> String {
    format!(
        "{}: expected {} ({}), found {}{}",
        comparison.field,
        comparison.expected,
        type_name(&comparison.expected),
        render(comparison.actual.as_ref()),
        comparison
            .actual
            .as_ref()
            .map(|actual| format!(" ({})", type_name(actual)))
            .unwrap_or_default(),
    )
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SERVICE_YAML: &str = r#"
spec:
  template:
    metadata:
      name: hello-00003-xyz
      labels:
        team: web
        managed-by: github-actions
      annotations:
        run.googleapis.com/cpu-throttling: 'false'
    spec:
      containerConcurrency: 80
      timeoutSeconds: 300
      containers:
      - env:
        - name: A
          value: '1'
        - name: B
          value: '2'
        - name: C
          value: '3'
        - name: API_KEY
          valueFrom:
            secretKeyRef:
              name: api-key
              key: latest
        resources:
          limits:
            cpu: '2'
            memory: 512Mi
        volumeMounts:
        - name: v
          mountPath: /a
      volumes:
      - name: v
        secret:
          secretName: s
          items:
          - key: k
            path: p
  traffic:
  - tag: blue
    percent: 50
  - latestRevision: true
    percent: 50
"#;

    fn service() -> Service {
        Service::from_yaml(SERVICE_YAML).unwrap()
    }

    fn config(pairs: &[(&str, &str)]) -> VerifyConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        VerifyConfig::from_vars(&vars)
    }

    fn run(category: Category, pairs: &[(&str, &str)]) -> CheckOutcome {
        run_check(category, &config(pairs), &service())
    }

    fn mismatch(outcome: CheckOutcome) -> Mismatch {
        match outcome {
            CheckOutcome::Failed(mismatch) => mismatch,
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn test_unset_category_is_skipped() {
        let outcome = run(Category::EnvVars, &[]);
        assert!(matches!(outcome, CheckOutcome::Skipped { ref missing } if missing == &["ENV"]));
        assert!(!outcome.is_failure());
    }

    #[test]
    fn test_env_vars_subset_passes() {
        assert!(matches!(
            run(Category::EnvVars, &[("ENV", "A=1,B=2")]),
            CheckOutcome::Passed
        ));
    }

    #[test]
    fn test_env_vars_missing_key_fails() {
        let mismatch = mismatch(run(Category::EnvVars, &[("ENV", "A=1,Z=9")]));

        assert_eq!(mismatch.category, Category::EnvVars);
        assert_eq!(mismatch.details.len(), 1);
        assert!(mismatch.details[0].starts_with("[1] \"Z\""));
        assert!(mismatch.details[0].ends_with("<absent>"));
        assert_eq!(
            mismatch.actual,
            serde_json::json!([{"name": "A", "value": "1"}, null])
        );
    }

    #[test]
    fn test_env_vars_wrong_value_fails() {
        let mismatch = mismatch(run(Category::EnvVars, &[("ENV", "A=2")]));
        assert_eq!(mismatch.details, vec!["[0] \"A\": expected value \"2\", found \"1\""]);
    }

    #[test]
    fn test_env_vars_format_error_is_errored() {
        let outcome = run(Category::EnvVars, &[("ENV", "A=1,NOPE")]);
        assert!(matches!(
            outcome,
            CheckOutcome::Errored(ExpectationError::Format { .. })
        ));
        assert!(outcome.is_failure());
    }

    #[test]
    fn test_plain_env_does_not_match_secret_entries() {
        let mismatch = mismatch(run(Category::EnvVars, &[("ENV", "API_KEY=api-key:latest")]));
        assert_eq!(mismatch.actual, serde_json::json!([null]));
    }

    #[test]
    fn test_secret_env_vars() {
        assert!(matches!(
            run(Category::SecretEnvVars, &[("SECRET_ENV", "API_KEY=api-key:latest")]),
            CheckOutcome::Passed
        ));
        assert!(run(Category::SecretEnvVars, &[("SECRET_ENV", "API_KEY=api-key:1")]).is_failure());
    }

    #[test]
    fn test_secret_volumes() {
        assert!(matches!(
            run(Category::SecretVolumes, &[("SECRET_VOLUMES", "/a/p=s:k")]),
            CheckOutcome::Passed
        ));
        assert!(matches!(
            run(Category::SecretVolumes, &[("SECRET_VOLUME", "/a/p=s:k")]),
            CheckOutcome::Passed
        ));
        assert!(run(Category::SecretVolumes, &[("SECRET_VOLUMES", "/a/q=s:k")]).is_failure());
    }

    #[test]
    fn test_params_cpu_number_coerces() {
        assert!(matches!(
            run(Category::Params, &[("PARAMS", r#"{"cpu": 2}"#)]),
            CheckOutcome::Passed
        ));
    }

    #[test]
    fn test_params_full_expectation() {
        let params = r#"{"containerConncurrency": 80, "timeoutSeconds": 300, "cpu": "2", "memory": "512Mi"}"#;
        assert!(matches!(
            run(Category::Params, &[("PARAMS", params)]),
            CheckOutcome::Passed
        ));
    }

    #[test]
    fn test_params_both_concurrency_spellings_checks_misspelled_key() {
        let params = r#"{"containerConncurrency": 80, "containerConcurrency": 1}"#;
        assert!(matches!(
            run(Category::Params, &[("PARAMS", params)]),
            CheckOutcome::Passed
        ));
    }

    #[test]
    fn test_params_falsy_values_are_unchecked() {
        let params = r#"{"cpu": 0, "memory": ""}"#;
        assert!(matches!(
            run(Category::Params, &[("PARAMS", params)]),
            CheckOutcome::Passed
        ));
    }

    #[test]
    fn test_params_memory_not_normalized() {
        let mismatch = mismatch(run(Category::Params, &[("PARAMS", r#"{"memory": "0.5Gi"}"#)]));
        assert_eq!(mismatch.expected, serde_json::json!({"memory": "0.5Gi"}));
        assert_eq!(mismatch.actual, serde_json::json!({"memory": "512Mi"}));
    }

    #[test]
    fn test_params_invalid_json_is_errored() {
        assert!(matches!(
            run(Category::Params, &[("PARAMS", "{")]),
            CheckOutcome::Errored(ExpectationError::Json { .. })
        ));
    }

    #[test]
    fn test_labels_subset_and_mismatch() {
        assert!(matches!(
            run(Category::Labels, &[("LABELS", r#"{"team": "web"}"#)]),
            CheckOutcome::Passed
        ));

        let mismatch = mismatch(run(Category::Labels, &[("LABELS", r#"{"owner": "ops"}"#)]));
        assert_eq!(mismatch.actual, serde_json::json!({"owner": null}));
    }

    #[test]
    fn test_annotations() {
        let annotations = r#"{"run.googleapis.com/cpu-throttling": "false"}"#;
        assert!(matches!(
            run(Category::Annotations, &[("ANNOTATIONS", annotations)]),
            CheckOutcome::Passed
        ));
    }

    #[test]
    fn test_revision_name() {
        assert!(matches!(
            run(Category::Revision, &[("REVISION", "hello-00003-xyz")]),
            CheckOutcome::Passed
        ));
        assert!(run(Category::Revision, &[("REVISION", "hello-00001-abc")]).is_failure());
    }

    #[test]
    fn test_tag() {
        assert!(matches!(
            run(Category::Tag, &[("TAG", "blue")]),
            CheckOutcome::Passed
        ));
        let mismatch = mismatch(run(Category::Tag, &[("TAG", "green")]));
        assert_eq!(mismatch.actual, Value::Null);
    }

    #[test]
    fn test_traffic_percent_string_never_equals_number() {
        let mismatch = mismatch(run(Category::Traffic, &[("TAG", "blue"), ("TRAFFIC", "50")]));

        assert_eq!(mismatch.expected, Value::from("50"));
        assert_eq!(mismatch.actual, Value::from(50));
        assert_eq!(
            mismatch.details,
            vec!["traffic percent: expected \"50\" (string), found 50 (number)"]
        );
    }

    #[test]
    fn test_traffic_requires_tag() {
        assert!(matches!(
            run(Category::Traffic, &[("TRAFFIC", "50")]),
            CheckOutcome::Skipped { .. }
        ));
    }

    #[test]
    fn test_mismatch_display_contains_payloads() {
        let mismatch = mismatch(run(Category::Revision, &[("REVISION", "other")]));
        let rendered = mismatch.to_string();

        assert!(rendered.starts_with("revision (has the revision name) mismatch:"));
        assert!(rendered.contains("expected:\n\"other\""));
        assert!(rendered.contains("actual:\n\"hello-00003-xyz\""));
    }
}
