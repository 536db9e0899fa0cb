// Custom-driver adapter: calls a `run_tests()` entry point shipped with the tests.
//
// No discovery happens. The entry point returns passed ids and failed
// (id, message) pairs; any exception escaping it is a harness error, never
// a set of failed tests.

use crate::config::FrameworkConfig;
use crate::engine::{read_report, run_child, ChildInvocation, ExecutionContext, TestAdapter};
use crate::error::HarnessError;
use crate::suppress::SuppressionScope;
use async_trait::async_trait;
use harness_common::types::{Coverage, Framework, RawResult, TestOutcome, TestRecord};
use serde::Deserialize;
use tracing::{info, instrument, warn};

const SHIM_FILE: &str = "harness_driver_shim.py";
const SHIM_SOURCE: &str = include_str!("../shims/driver_shim.py");
const MODULE_ENV: &str = "HARNESS_DRIVER_MODULE";
const ENTRY_ENV: &str = "HARNESS_DRIVER_ENTRY";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FailedEntry {
    Pair(String, String),
    Bare(String),
}

impl FailedEntry {
    fn into_record(self) -> TestRecord {
        match self {
            FailedEntry::Pair(id, message) => TestRecord::failing(id, TestOutcome::Failed, message),
            FailedEntry::Bare(id) => TestRecord::failing(id, TestOutcome::Failed, ""),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DriverReport {
    Raised { error: String },
    Returned {
        passed: Vec<String>,
        failed: Vec<FailedEntry>,
    },
}

impl DriverReport {
    fn into_raw(self) -> Result<RawResult, HarnessError> {
        match self {
            DriverReport::Raised { error } => Err(HarnessError::Crash(error)),
            DriverReport::Returned { passed, failed } => {
                let records: Vec<TestRecord> = passed
                    .into_iter()
                    .map(TestRecord::passed)
                    .chain(failed.into_iter().map(FailedEntry::into_record))
                    .collect();
                Ok(RawResult {
                    total: records.len(),
                    records,
                    coverage: Coverage::NotCollected,
                })
            }
        }
    }
}

pub struct DriverAdapter {
    config: FrameworkConfig,
}

impl DriverAdapter {
    pub fn new(config: FrameworkConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TestAdapter for DriverAdapter {
    fn framework(&self) -> Framework {
        Framework::Driver
    }

    #[instrument(
        skip_all,
        fields(
            framework = "driver",
            module = %self.config.driver_module(),
            entry = %self.config.driver_entry()
        )
    )]
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        scope: &SuppressionScope,
    ) -> Result<RawResult, HarnessError> {
        let shim = ctx.install_shim(SHIM_FILE, SHIM_SOURCE).await?;

        let invocation = ChildInvocation::default()
            .args(&self.config.extra_args)
            .arg(shim)
            .env(MODULE_ENV, self.config.driver_module())
            .env(ENTRY_ENV, self.config.driver_entry());

        let status = run_child(&self.config, invocation, ctx, scope).await?;
        let report: DriverReport = read_report(ctx, Framework::Driver, &status).await?;

        match report.into_raw() {
            Ok(raw) => {
                info!(
                    tests = raw.total,
                    failing = raw.failing_count(),
                    "Test driver returned"
                );
                Ok(raw)
            }
            Err(e) => {
                warn!(error = %e, "Test driver raised");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returned_report() {
        let report: DriverReport = serde_json::from_str(
            r#"{"passed": ["valid_simple", "valid_dots"],
                "failed": [["invalid_at", "expected None, got 'a@'"], "bare_failure"]}"#,
        )
        .unwrap();

        let raw = report.into_raw().unwrap();

        assert_eq!(raw.total, 4);
        assert_eq!(raw.failing_count(), 2);
        assert_eq!(raw.records[2].id, "invalid_at");
        assert_eq!(
            raw.records[2].detail.as_deref(),
            Some("expected None, got 'a@'")
        );
        assert_eq!(raw.records[3].id, "bare_failure");
        assert_eq!(raw.records[3].detail.as_deref(), Some(""));
    }

    #[test]
    fn test_raised_report_is_a_crash() {
        let report: DriverReport =
            serde_json::from_str(r#"{"error": "name 'find_email' is not defined"}"#).unwrap();

        let err = report.into_raw().unwrap_err();

        assert!(matches!(err, HarnessError::Crash(_)));
        assert_eq!(err.to_string(), "name 'find_email' is not defined");
    }

    #[test]
    fn test_empty_driver_run() {
        let report: DriverReport = serde_json::from_str(r#"{"passed": [], "failed": []}"#).unwrap();
        let raw = report.into_raw().unwrap();
        assert_eq!(raw.total, 0);
    }
}
