//! Subset matching between expectations and a described service.
//!
//! Extraction never fails: a missing container, volume list or traffic
//! block yields no actual values, and every expected entry then matches
//! `None`. `None` is never equal to a present value.

use crate::expectation::{is_truthy, EnvVarExpectation, ParamsExpectation};
use crate::manifest::{Container, EnvVar, Service, Volume, VolumeMount};
use serde_json::Value;
use std::collections::BTreeMap;

/// One field-level comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: &'static str,
    pub expected: Value,
    pub actual: Option<Value>,
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        self.actual.as_ref() == Some(&self.expected)
    }
}

/// For each expected entry, the first actual entry with the same name.
///
/// The result is aligned positionally with `expected`.
pub fn match_by_name(
    expected: &[EnvVarExpectation],
    actual: &[EnvVarExpectation],
) -> Vec<Option<EnvVarExpectation>> {
    expected
        .iter()
        .map(|e| actual.iter().find(|a| a.name == e.name).cloned())
        .collect()
}

fn first_container_env(service: &Service) -> impl Iterator<Item = &EnvVar> {
    service
        .first_container()
        .map(|container| container.env.as_slice())
        .unwrap_or_default()
        .iter()
}

/// Plain env vars of the first container: entries with a non-empty `value`.
pub fn actual_env_vars(service: &Service) -> Vec<EnvVarExpectation> {
    first_container_env(service)
        .filter_map(|env| {
            let name = env.name.as_deref()?;
            let value = env.value.as_deref().filter(|v| !v.is_empty())?;
            Some(EnvVarExpectation::new(name, value))
        })
        .collect()
}

/// Secret-backed env vars of the first container, valued `secretName:secretKey`.
pub fn actual_secret_env_vars(service: &Service) -> Vec<EnvVarExpectation> {
    first_container_env(service)
        .filter_map(|env| {
            let name = env.name.as_deref()?;
            let secret_ref = env.value_from.as_ref()?.secret_key_ref.as_ref()?;
            let secret_name = secret_ref.name.as_deref()?;
            let secret_key = secret_ref.key.as_deref()?;
            Some(EnvVarExpectation::new(
                name,
                format!("{secret_name}:{secret_key}"),
            ))
        })
        .collect()
}

/// Secret volume entry for one mount of the first container.
///
/// Only the first item of the secret volume is represented.
fn secret_volume_entry(mount: &VolumeMount, volumes: &[Volume]) -> Option<EnvVarExpectation> {
    let mount_name = mount.name.as_deref()?;
    let mount_path = mount.mount_path.as_deref()?;
    let secret = volumes
        .iter()
        .find(|volume| volume.name.as_deref() == Some(mount_name))?
        .secret
        .as_ref()?;
    let secret_name = secret.secret_name.as_deref()?;
    let item = secret.items.first()?;
    let item_path = item.path.as_deref()?;
    let item_key = item.key.as_deref()?;

    Some(EnvVarExpectation::new(
        format!("{mount_path}/{item_path}"),
        format!("{secret_name}:{item_key}"),
    ))
}

/// Secret volumes mounted into the first container, named
/// `mountPath/itemPath` and valued `secretName:itemKey`.
pub fn actual_secret_volumes(service: &Service) -> Vec<EnvVarExpectation> {
    let volumes = service.volumes().unwrap_or_default();
    service
        .first_container()
        .map(|container: &Container| container.volume_mounts.as_slice())
        .unwrap_or_default()
        .iter()
        .filter_map(|mount| secret_volume_entry(mount, volumes))
        .collect()
}

/// Project `actual` onto the keys of `expected`.
///
/// Keys absent from `actual` project to `None`. Extra actual keys are
/// dropped, so adding unrelated keys never changes the projection.
pub fn project_map(
    expected: &BTreeMap<String, String>,
    actual: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, Option<String>> {
    let mut projected = BTreeMap::new();
    for key in expected.keys() {
        let value = actual.and_then(|map| map.get(key)).cloned();
        projected.insert(key.clone(), value);
    }
    projected
}

pub fn actual_labels(service: &Service) -> Option<&BTreeMap<String, String>> {
    service.template_metadata().map(|meta| &meta.labels)
}

pub fn actual_annotations(service: &Service) -> Option<&BTreeMap<String, String>> {
    service.template_metadata().map(|meta| &meta.annotations)
}

/// Field comparisons for every truthy param in the expectation.
///
/// `0`, `""`, `false` and `null` leave the field unchecked.
pub fn compare_params(expected: &ParamsExpectation, service: &Service) -> Vec<Comparison> {
    let spec = service.revision_spec();
    let limits = service.limits();
    let checked = |value: &Option<Value>| value.clone().filter(is_truthy);
    let mut comparisons = Vec::new();

    if let Some(concurrency) = checked(&expected.container_concurrency) {
        comparisons.push(Comparison {
            field: "containerConcurrency",
            expected: concurrency,
            actual: spec
                .and_then(|s| s.container_concurrency)
                .map(Value::from),
        });
    }

    if let Some(timeout) = checked(&expected.timeout_seconds) {
        comparisons.push(Comparison {
            field: "timeoutSeconds",
            expected: timeout,
            actual: spec.and_then(|s| s.timeout_seconds).map(Value::from),
        });
    }

    if let Some(cpu) = checked(&expected.cpu).and(expected.cpu_string()) {
        comparisons.push(Comparison {
            field: "cpu",
            expected: Value::String(cpu),
            actual: limits.and_then(|l| l.get("cpu")).cloned(),
        });
    }

    if let Some(memory) = checked(&expected.memory) {
        comparisons.push(Comparison {
            field: "memory",
            expected: memory,
            actual: limits.and_then(|l| l.get("memory")).cloned(),
        });
    }

    comparisons
}

/// Name of the revision template.
pub fn actual_revision_name(service: &Service) -> Option<&str> {
    service.template_metadata()?.name.as_deref()
}

/// Tag of the first traffic entry carrying `tag`.
pub fn actual_tag<'a>(service: &'a Service, tag: &str) -> Option<&'a str> {
    service
        .traffic()?
        .iter()
        .find_map(|target| target.tag.as_deref().filter(|t| *t == tag))
}

/// Traffic percent of the first entry carrying `tag`, as a JSON number.
pub fn actual_traffic_percent(service: &Service, tag: &str) -> Option<Value> {
    service
        .traffic()?
        .iter()
        .find(|target| target.tag.as_deref() == Some(tag))?
        .percent
        .map(Value::from)
}
