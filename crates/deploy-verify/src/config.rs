//! Verification configuration.
//!
//! Configuration is loaded from environment variables. The target service
//! is required for any run; every expectation category is optional and is
//! gated independently on its own variables.

use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default region for `gcloud run services describe`.
pub const DEFAULT_REGION: &str = "us-central1";

/// Default gcloud executable, resolved through `PATH`.
pub const DEFAULT_GCLOUD_BIN: &str = "gcloud";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// The deployed service to describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTarget {
    pub service: String,
    pub project_id: String,
    pub region: String,
}

/// One independently gated expectation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    EnvVars,
    SecretEnvVars,
    SecretVolumes,
    Params,
    Annotations,
    Labels,
    Revision,
    Tag,
    Traffic,
}

impl Category {
    /// Every category, in reporting order.
    pub const ALL: [Category; 9] = [
        Category::EnvVars,
        Category::SecretEnvVars,
        Category::SecretVolumes,
        Category::Params,
        Category::Annotations,
        Category::Labels,
        Category::Revision,
        Category::Tag,
        Category::Traffic,
    ];

    /// Variables that must all be set for the category to run.
    ///
    /// `SecretVolumes` is special-cased in [`VerifyConfig::gate`]: either
    /// `SECRET_VOLUMES` or `SECRET_VOLUME` satisfies it.
    pub fn required_vars(&self) -> &'static [&'static str] {
        match self {
            Category::EnvVars => &["ENV"],
            Category::SecretEnvVars => &["SECRET_ENV"],
            Category::SecretVolumes => &["SECRET_VOLUMES"],
            Category::Params => &["PARAMS"],
            Category::Annotations => &["ANNOTATIONS"],
            Category::Labels => &["LABELS"],
            Category::Revision => &["REVISION"],
            Category::Tag => &["TAG"],
            Category::Traffic => &["TRAFFIC", "TAG"],
        }
    }

    /// Human-readable check description.
    pub fn description(&self) -> &'static str {
        match self {
            Category::EnvVars => "has the correct envvars",
            Category::SecretEnvVars => "has the correct secret vars",
            Category::SecretVolumes => "has the correct secret volumes",
            Category::Params => "has the correct params",
            Category::Annotations => "has the correct annotations",
            Category::Labels => "has the correct labels",
            Category::Revision => "has the revision name",
            Category::Tag => "has the correct tag",
            Category::Traffic => "has the correct traffic",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::EnvVars => "env_vars",
            Category::SecretEnvVars => "secret_env_vars",
            Category::SecretVolumes => "secret_volumes",
            Category::Params => "params",
            Category::Annotations => "annotations",
            Category::Labels => "labels",
            Category::Revision => "revision",
            Category::Tag => "tag",
            Category::Traffic => "traffic",
        };
        f.write_str(name)
    }
}

/// Whether a category check should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Run,
    Skip { missing: Vec<&'static str> },
}

/// Verification configuration.
///
/// Expectation values are kept as the raw strings from the environment;
/// each check parses its own input so one malformed category cannot abort
/// the others.
#[derive(Debug, Clone, Default)]
pub struct VerifyConfig {
    /// Cloud Run service name (`SERVICE`).
    pub service: Option<String>,

    /// GCP project (`PROJECT_ID`).
    pub project_id: Option<String>,

    /// Region passed to gcloud (default: "us-central1").
    pub region: String,

    /// gcloud executable (default: "gcloud").
    pub gcloud_bin: String,

    /// `KEY=VALUE,...` plain env var expectations.
    pub env: Option<String>,

    /// `KEY=secretName:secretKey,...` secret env var expectations.
    pub secret_env: Option<String>,

    /// `MOUNT/PATH=secretName:secretKey,...` secret volume expectations.
    /// Taken from `SECRET_VOLUMES`, falling back to `SECRET_VOLUME`.
    pub secret_volumes: Option<String>,

    /// JSON object of resource params.
    pub params: Option<String>,

    /// JSON object of expected template annotations.
    pub annotations: Option<String>,

    /// JSON object of expected template labels.
    pub labels: Option<String>,

    /// Expected revision name.
    pub revision: Option<String>,

    /// Expected traffic tag.
    pub tag: Option<String>,

    /// Expected traffic percent for the `TAG` entry, as a string.
    pub traffic: Option<String>,
}

impl VerifyConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let get = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();

        VerifyConfig {
            service: get("SERVICE"),
            project_id: get("PROJECT_ID"),
            region: get("REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            gcloud_bin: get("GCLOUD_BIN").unwrap_or_else(|| DEFAULT_GCLOUD_BIN.to_string()),
            env: get("ENV"),
            secret_env: get("SECRET_ENV"),
            secret_volumes: get("SECRET_VOLUMES").or_else(|| get("SECRET_VOLUME")),
            params: get("PARAMS"),
            annotations: get("ANNOTATIONS"),
            labels: get("LABELS"),
            revision: get("REVISION"),
            tag: get("TAG"),
            traffic: get("TRAFFIC"),
        }
    }

    /// Resolve the service to describe.
    pub fn target(&self) -> Result<ServiceTarget, ConfigError> {
        let project_id = self
            .project_id
            .clone()
            .ok_or_else(|| ConfigError::MissingEnvVar("PROJECT_ID".to_string()))?;
        let service = self
            .service
            .clone()
            .ok_or_else(|| ConfigError::MissingEnvVar("SERVICE".to_string()))?;

        Ok(ServiceTarget {
            service,
            project_id,
            region: self.region.clone(),
        })
    }

    /// Raw value of one expectation variable.
    fn raw(&self, var: &str) -> Option<&str> {
        let value = match var {
            "ENV" => &self.env,
            "SECRET_ENV" => &self.secret_env,
            "SECRET_VOLUMES" => &self.secret_volumes,
            "PARAMS" => &self.params,
            "ANNOTATIONS" => &self.annotations,
            "LABELS" => &self.labels,
            "REVISION" => &self.revision,
            "TAG" => &self.tag,
            "TRAFFIC" => &self.traffic,
            _ => return None,
        };
        value.as_deref()
    }

    /// Decide whether a category check runs.
    pub fn gate(&self, category: Category) -> Gate {
        let missing: Vec<&'static str> = category
            .required_vars()
            .iter()
            .copied()
            .filter(|var| self.raw(var).is_none())
            .map(|var| match (category, var) {
                (Category::SecretVolumes, _) => "SECRET_VOLUMES|SECRET_VOLUME",
                (_, var) => var,
            })
            .collect();

        if missing.is_empty() {
            Gate::Run
        } else {
            Gate::Skip { missing }
        }
    }
}
