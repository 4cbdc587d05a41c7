//! Live acceptance tests: Deployed Service
//!
//! These tests describe the deployed service once and assert each
//! expectation category against it. A category whose variables are unset is
//! skipped; the whole suite is skipped when `PROJECT_ID` or `SERVICE` is
//! unset.

#![cfg(feature = "deployed")]
#![allow(clippy::expect_used, clippy::panic)]

use deploy_verify::check::{run_check, CheckOutcome};
use deploy_verify::config::{Category, VerifyConfig};
use deploy_verify::fetcher::{GcloudDescriber, ManifestSource};
use deploy_verify::manifest::Service;
use std::sync::LazyLock;

static CONFIG: LazyLock<VerifyConfig> = LazyLock::new(VerifyConfig::from_env);

/// The service, described once and shared by every test.
static SERVICE: LazyLock<Option<Service>> = LazyLock::new(|| {
    let target = CONFIG.target().ok()?;
    let service = GcloudDescriber::new(CONFIG.gcloud_bin.clone())
        .describe(&target)
        .expect("failed to find service definition");
    Some(service)
});

fn assert_category(category: Category) {
    let Some(service) = SERVICE.as_ref() else {
        eprintln!("skipping {category}: PROJECT_ID or SERVICE is unset");
        return;
    };

    match run_check(category, &CONFIG, service) {
        CheckOutcome::Passed => {}
        CheckOutcome::Skipped { missing } => {
            eprintln!("skipping {category}: {} unset", missing.join(", "));
        }
        CheckOutcome::Failed(mismatch) => panic!("{mismatch}"),
        CheckOutcome::Errored(err) => panic!("{category}: {err}"),
    }
}

#[test]
fn test_has_correct_envvars() {
    assert_category(Category::EnvVars);
}

#[test]
fn test_has_correct_secret_vars() {
    assert_category(Category::SecretEnvVars);
}

#[test]
fn test_has_correct_secret_volumes() {
    assert_category(Category::SecretVolumes);
}

#[test]
fn test_has_correct_params() {
    assert_category(Category::Params);
}

#[test]
fn test_has_correct_annotations() {
    assert_category(Category::Annotations);
}

#[test]
fn test_has_correct_labels() {
    assert_category(Category::Labels);
}

#[test]
fn test_has_revision_name() {
    assert_category(Category::Revision);
}

#[test]
fn test_has_correct_tag() {
    assert_category(Category::Tag);
}

#[test]
fn test_has_correct_traffic() {
    assert_category(Category::Traffic);
}
