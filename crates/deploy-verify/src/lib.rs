//! Deployed Service Verification
//!
//! Post-deployment acceptance checks for a Cloud Run service. The live
//! configuration is described once with `gcloud run services describe` and
//! compared, category by category, against expectations supplied through
//! environment variables.
//!
//! # Categories
//!
//! | Variable(s)                       | Checks                                    |
//! |-----------------------------------|-------------------------------------------|
//! | `ENV`                             | plain env vars of the first container     |
//! | `SECRET_ENV`                      | secret-backed env vars (`secret:key`)     |
//! | `SECRET_VOLUMES` / `SECRET_VOLUME`| secret volume mounts (`/path/item=s:key`) |
//! | `PARAMS`                          | concurrency, timeout, cpu, memory         |
//! | `ANNOTATIONS`, `LABELS`           | template metadata (subset match)          |
//! | `REVISION`                        | template revision name                    |
//! | `TAG`, `TRAFFIC`                  | traffic tag and its percent               |
//!
//! Unset variables skip their category. `PROJECT_ID` and `SERVICE` select the
//! target; `REGION` defaults to `us-central1`.
//!
//! # Usage
//!
//! ```bash
//! # Offline unit and fixture tests
//! cargo test -p deploy-verify
//!
//! # Live acceptance suite against a deployed service
//! PROJECT_ID=my-proj SERVICE=hello ENV="A=1,B=2" \
//!     cargo test -p deploy-verify --features deployed
//!
//! # Same checks as a CLI, non-zero exit on any mismatch
//! PROJECT_ID=my-proj SERVICE=hello LABELS='{"team":"web"}' cargo run -p deploy-verify
//! ```

pub mod check;
pub mod config;
pub mod expectation;
pub mod fetcher;
pub mod manifest;
pub mod matcher;
pub mod runner;
