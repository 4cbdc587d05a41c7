//! Manifest fetcher.
//!
//! Describes the deployed service once per run via
//! `gcloud run services describe ... --format yaml`.

use crate::config::ServiceTarget;
use crate::manifest::{ManifestError, Service};
use regex::Regex;
use std::process::Command;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

/// Maximum length for stderr in error messages.
const MAX_STDERR_LEN: usize = 512;

/// Regex pattern for Google OAuth access tokens.
static ACCESS_TOKEN_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"ya29\.[A-Za-z0-9_\-.]+").ok());

/// Regex pattern for Bearer tokens in text.
static BEARER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)bearer\s+[A-Za-z0-9_\-.]+").ok());

/// Sanitize gcloud stderr before it lands in an error message.
///
/// This function:
/// - Removes Bearer token patterns (first, so "Bearer ya29..." is redacted whole)
/// - Removes OAuth access tokens (ya29...)
/// - Truncates long output to MAX_STDERR_LEN
fn sanitize_stderr(stderr: &str) -> String {
    let mut sanitized = stderr.trim().to_string();
    if let Some(pattern) = BEARER_PATTERN.as_ref() {
        sanitized = pattern
            .replace_all(&sanitized, "[BEARER_REDACTED]")
            .into_owned();
    }
    if let Some(pattern) = ACCESS_TOKEN_PATTERN.as_ref() {
        sanitized = pattern
            .replace_all(&sanitized, "[TOKEN_REDACTED]")
            .into_owned();
    }

    if sanitized.len() > MAX_STDERR_LEN {
        let mut end = MAX_STDERR_LEN;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", sanitized.get(..end).unwrap_or_default())
    } else {
        sanitized
    }
}

/// Manifest fetch errors.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Source of the deployed service manifest.
pub trait ManifestSource: Send + Sync {
    fn describe(&self, target: &ServiceTarget) -> Result<Service, FetchError>;
}

/// Describes services through the gcloud CLI.
#[derive(Debug, Clone)]
pub struct GcloudDescriber {
    program: String,
}

impl GcloudDescriber {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments for `gcloud run services describe`.
    pub fn args(target: &ServiceTarget) -> Vec<String> {
        [
            "run",
            "services",
            "describe",
            target.service.as_str(),
            "--project",
            target.project_id.as_str(),
            "--format",
            "yaml",
            "--platform",
            "managed",
            "--region",
            target.region.as_str(),
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
    }
}

impl Default for GcloudDescriber {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_GCLOUD_BIN)
    }
}

impl ManifestSource for GcloudDescriber {
    fn describe(&self, target: &ServiceTarget) -> Result<Service, FetchError> {
        info!(
            service = %target.service,
            project_id = %target.project_id,
            region = %target.region,
            "Describing deployed service"
        );

        let output = Command::new(&self.program)
            .args(Self::args(target))
            .output()
            .map_err(|source| FetchError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(FetchError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: sanitize_stderr(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(bytes = stdout.len(), "Received service description");

        Ok(Service::from_yaml(&stdout)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn target() -> ServiceTarget {
        ServiceTarget {
            service: "hello".to_string(),
            project_id: "proj".to_string(),
            region: "us-central1".to_string(),
        }
    }

    #[test]
    fn test_describe_args() {
        assert_eq!(
            GcloudDescriber::args(&target()),
            vec![
                "run",
                "services",
                "describe",
                "hello",
                "--project",
                "proj",
                "--format",
                "yaml",
                "--platform",
                "managed",
                "--region",
                "us-central1",
            ]
        );
    }

    #[test]
    fn test_sanitize_stderr_redacts_tokens() {
        let stderr = "ERROR: request with Bearer ya29.a0AfH6SMB failed; token ya29.c.Kp8B leaked";
        let sanitized = sanitize_stderr(stderr);

        assert!(!sanitized.contains("ya29."));
        assert!(sanitized.contains("[BEARER_REDACTED]"));
        assert!(sanitized.contains("[TOKEN_REDACTED]"));
    }

    #[test]
    fn test_sanitize_stderr_truncates() {
        let sanitized = sanitize_stderr(&"x".repeat(2000));
        assert!(sanitized.ends_with("...[truncated]"));
        assert_eq!(sanitized.len(), MAX_STDERR_LEN + "...[truncated]".len());
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let describer = GcloudDescriber::new("/nonexistent/gcloud-for-deploy-verify");
        let err = describer.describe(&target()).expect_err("program does not exist");
        assert!(matches!(err, FetchError::Spawn { .. }));
    }

    /// All scripted scenarios run in one test so no two tests race on
    /// writing and executing scripts.
    #[cfg(unix)]
    #[test]
    fn test_describe_with_fake_gcloud() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            GcloudDescriber::new(path.to_string_lossy())
        };

        let describer = script(
            "ok",
            "echo 'kind: Service'\necho 'metadata:'\necho '  name: hello'",
        );
        let service = describer.describe(&target()).unwrap();
        assert_eq!(
            service.metadata.and_then(|m| m.name).as_deref(),
            Some("hello")
        );

        let describer = script(
            "missing",
            "echo 'ERROR: Cannot find service [hello]' >&2\nexit 1",
        );
        let err = describer.describe(&target()).expect_err("gcloud failed");
        assert!(matches!(
            err,
            FetchError::CommandFailed { ref stderr, .. } if stderr == "ERROR: Cannot find service [hello]"
        ));

        let describer = script("empty", "exit 0");
        let err = describer.describe(&target()).expect_err("no service");
        assert!(matches!(err, FetchError::Manifest(ManifestError::Empty)));
        assert_eq!(err.to_string(), "failed to find service definition");
    }
}
