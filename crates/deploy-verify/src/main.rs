//! deploy-verify
//!
//! Describes a deployed Cloud Run service and checks it against the
//! expectations in the environment.
//!
//! Exit status: 0 when every configured check passed (or the target is
//! unset), 1 when any check failed, 2 when the service could not be
//! described.

use deploy_verify::check::CheckOutcome;
use deploy_verify::config::VerifyConfig;
use deploy_verify::fetcher::GcloudDescriber;
use deploy_verify::runner::{verify, VerifyError};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deploy_verify=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = VerifyConfig::from_env();
    info!(
        service = ?config.service,
        project_id = ?config.project_id,
        region = %config.region,
        "Configuration loaded"
    );

    let describer = Arc::new(GcloudDescriber::new(config.gcloud_bin.clone()));

    let report = match verify(describer, config).await {
        Ok(report) => report,
        Err(VerifyError::Config(e)) => {
            warn!("Skipping verification: {}", e);
            return Ok(ExitCode::SUCCESS);
        }
        Err(VerifyError::Fetch(e)) => {
            error!("Failed to describe service: {}", e);
            return Ok(ExitCode::from(2));
        }
        Err(e) => return Err(e.into()),
    };

    for (category, outcome) in &report.outcomes {
        match outcome {
            CheckOutcome::Failed(mismatch) => eprintln!("{mismatch}\n"),
            CheckOutcome::Errored(e) => eprintln!("{category} ({}): {e}\n", category.description()),
            CheckOutcome::Passed | CheckOutcome::Skipped { .. } => {}
        }
    }

    let summary = report.summary();
    info!(
        passed = summary.passed,
        failed = summary.failed,
        errored = summary.errored,
        skipped = summary.skipped,
        "Verification complete"
    );

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
