//! Verification runner.
//!
//! The service is described exactly once; every category check then reads
//! the same immutable manifest concurrently. No check waits on another.

use crate::check::{run_check, CheckOutcome};
use crate::config::{Category, ConfigError, VerifyConfig};
use crate::fetcher::{FetchError, ManifestSource};
use crate::manifest::Service;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Errors that abort a run before any category check.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Task did not complete: {0}")]
    Task(String),
}

/// Outcome counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
}

/// Outcomes of every category, in [`Category::ALL`] order.
#[derive(Debug)]
pub struct Report {
    pub outcomes: Vec<(Category, CheckOutcome)>,
}

impl Report {
    /// True when no category failed or errored. Skips do not count.
    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(|(_, outcome)| outcome.is_failure())
    }

    pub fn outcome(&self, category: Category) -> Option<&CheckOutcome> {
        self.outcomes
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, outcome)| outcome)
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for (_, outcome) in &self.outcomes {
            match outcome {
                CheckOutcome::Passed => summary.passed += 1,
                CheckOutcome::Failed(_) => summary.failed += 1,
                CheckOutcome::Errored(_) => summary.errored += 1,
                CheckOutcome::Skipped { .. } => summary.skipped += 1,
            }
        }
        summary
    }
}

/// Runs every category check against one shared service.
pub struct Verifier {
    config: Arc<VerifyConfig>,
    service: Arc<Service>,
}

impl Verifier {
    pub fn new(config: VerifyConfig, service: Arc<Service>) -> Self {
        Self {
            config: Arc::new(config),
            service,
        }
    }

    /// Run all categories concurrently and collect their outcomes.
    pub async fn run_all(&self) -> Result<Report, VerifyError> {
        let mut tasks = JoinSet::new();

        for category in Category::ALL {
            let config = Arc::clone(&self.config);
            let service = Arc::clone(&self.service);
            tasks.spawn(async move { (category, run_check(category, &config, &service)) });
        }

        let mut outcomes = Vec::with_capacity(Category::ALL.len());
        while let Some(joined) = tasks.join_next().await {
            let (category, outcome) = joined.map_err(|e| VerifyError::Task(e.to_string()))?;
            log_outcome(category, &outcome);
            outcomes.push((category, outcome));
        }

        outcomes.sort_by_key(|(category, _)| *category);
        Ok(Report { outcomes })
    }
}

fn log_outcome(category: Category, outcome: &CheckOutcome) {
    match outcome {
        CheckOutcome::Passed => info!(category = %category, "{}: passed", category.description()),
        CheckOutcome::Skipped { missing } => debug!(
            category = %category,
            missing = ?missing,
            "{}: skipped",
            category.description()
        ),
        CheckOutcome::Failed(mismatch) => error!(
            category = %category,
            details = ?mismatch.details,
            "{}: failed",
            category.description()
        ),
        CheckOutcome::Errored(err) => error!(
            category = %category,
            error = %err,
            "{}: invalid expectation",
            category.description()
        ),
    }
}

/// Describe the target once, then run every category check.
///
/// Fails before any check runs if the target is unset or the service
/// cannot be described.
pub async fn verify<S>(source: Arc<S>, config: VerifyConfig) -> Result<Report, VerifyError>
where
    S: ManifestSource + ?Sized + 'static,
{
    let target = config.target()?;

    let fetch_target = target.clone();
    let service = tokio::task::spawn_blocking(move || source.describe(&fetch_target))
        .await
        .map_err(|e| VerifyError::Task(format!("manifest fetch: {e}")))?
        .map_err(|e| {
            warn!(service = %target.service, error = %e, "Failed to describe service");
            e
        })?;

    info!(service = %target.service, "Service described, running checks");
    Verifier::new(config, Arc::new(service)).run_all().await
}
