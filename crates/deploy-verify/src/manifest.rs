//! Subset of the Cloud Run (Knative serving v1) `Service` resource.
//!
//! Only the fields that are asserted on are modelled. Every field is
//! optional or defaults to empty so a sparse document still parses; lookups
//! through the navigation helpers yield `None` at the first missing step.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to find service definition")]
    Empty,

    #[error("YAML deserialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub api_version: Option<String>,
    pub kind: Option<String>,
    pub metadata: Option<ObjectMeta>,
    pub spec: Option<ServiceSpec>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    pub template: Option<RevisionTemplate>,
    #[serde(default)]
    pub traffic: Vec<TrafficTarget>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RevisionTemplate {
    pub metadata: Option<ObjectMeta>,
    pub spec: Option<RevisionSpec>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RevisionSpec {
    pub container_concurrency: Option<i64>,
    pub timeout_seconds: Option<i64>,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub image: Option<String>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    #[serde(default)]
    pub volume_mounts: Vec<VolumeMount>,
    pub resources: Option<ResourceRequirements>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    pub name: Option<String>,
    pub value: Option<String>,
    pub value_from: Option<EnvVarSource>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSource {
    pub secret_key_ref: Option<SecretKeySelector>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SecretKeySelector {
    pub name: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub name: Option<String>,
    pub mount_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Volume {
    pub name: Option<String>,
    pub secret: Option<SecretVolumeSource>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretVolumeSource {
    pub secret_name: Option<String>,
    #[serde(default)]
    pub items: Vec<KeyToPath>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct KeyToPath {
    pub key: Option<String>,
    pub path: Option<String>,
}

/// Resource limits keep their YAML scalar type: `cpu: 1` and `cpu: '1'`
/// are different values to the matcher.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub limits: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrafficTarget {
    pub tag: Option<String>,
    pub percent: Option<i64>,
    pub revision_name: Option<String>,
    pub latest_revision: Option<bool>,
}

impl Service {
    /// Parse `gcloud ... --format yaml` output.
    ///
    /// An empty or `null` document means the service was not found.
    pub fn from_yaml(yaml: &str) -> Result<Self, ManifestError> {
        if yaml.trim().is_empty() {
            return Err(ManifestError::Empty);
        }

        let service: Option<Service> = serde_yaml::from_str(yaml)?;
        service.ok_or(ManifestError::Empty)
    }

    pub fn template(&self) -> Option<&RevisionTemplate> {
        self.spec.as_ref()?.template.as_ref()
    }

    pub fn template_metadata(&self) -> Option<&ObjectMeta> {
        self.template()?.metadata.as_ref()
    }

    pub fn revision_spec(&self) -> Option<&RevisionSpec> {
        self.template()?.spec.as_ref()
    }

    /// The first container of the revision template.
    pub fn first_container(&self) -> Option<&Container> {
        self.revision_spec()?.containers.first()
    }

    pub fn volumes(&self) -> Option<&[Volume]> {
        self.revision_spec().map(|spec| spec.volumes.as_slice())
    }

    pub fn traffic(&self) -> Option<&[TrafficTarget]> {
        self.spec.as_ref().map(|spec| spec.traffic.as_slice())
    }

    /// Resource limits of the first container.
    pub fn limits(&self) -> Option<&BTreeMap<String, Value>> {
        self.first_container()?
            .resources
            .as_ref()
            .map(|resources| &resources.limits)
    }
}
