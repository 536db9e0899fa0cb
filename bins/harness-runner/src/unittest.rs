// Discovery-suite adapter: unittest pattern discovery under the tests root

use crate::config::FrameworkConfig;
use crate::engine::{read_report, run_child, ChildInvocation, ExecutionContext, TestAdapter};
use crate::error::HarnessError;
use crate::suppress::SuppressionScope;
use async_trait::async_trait;
use harness_common::types::{Coverage, Framework, RawResult, TestOutcome, TestRecord};
use serde::Deserialize;
use tracing::{info, instrument};

const SHIM_FILE: &str = "harness_unittest_shim.py";
const SHIM_SOURCE: &str = include_str!("../shims/unittest_shim.py");
const PATTERN_ENV: &str = "HARNESS_PATTERN";
const DEFAULT_PATTERN: &str = "test*.py";

#[derive(Debug, Deserialize)]
struct ReportedProblem {
    id: String,
    detail: String,
}

/// What the discovery shim writes after `suite.run()`
#[derive(Debug, Deserialize)]
struct DiscoveryReport {
    tests_run: usize,
    #[serde(default)]
    failures: Vec<ReportedProblem>,
    #[serde(default)]
    errors: Vec<ReportedProblem>,
    #[serde(default)]
    unexpected_successes: Vec<String>,
}

impl DiscoveryReport {
    /// Failures first, then errors, then unexpected successes
    fn into_raw(self) -> RawResult {
        let failures = self
            .failures
            .into_iter()
            .map(|p| TestRecord::failing(p.id, TestOutcome::Failed, p.detail));
        let errors = self
            .errors
            .into_iter()
            .map(|p| TestRecord::failing(p.id, TestOutcome::Errored, p.detail));
        let unexpected = self
            .unexpected_successes
            .into_iter()
            .map(|id| TestRecord::failing(id, TestOutcome::Failed, "unexpected success"));

        RawResult {
            total: self.tests_run,
            records: failures.chain(errors).chain(unexpected).collect(),
            coverage: Coverage::NotCollected,
        }
    }
}

pub struct UnittestAdapter {
    config: FrameworkConfig,
}

impl UnittestAdapter {
    pub fn new(config: FrameworkConfig) -> Self {
        Self { config }
    }

    fn pattern(&self) -> &str {
        self.config.pattern.as_deref().unwrap_or(DEFAULT_PATTERN)
    }
}

#[async_trait]
impl TestAdapter for UnittestAdapter {
    fn framework(&self) -> Framework {
        Framework::Unittest
    }

    #[instrument(skip_all, fields(framework = "unittest", pattern = %self.pattern()))]
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        scope: &SuppressionScope,
    ) -> Result<RawResult, HarnessError> {
        let shim = ctx.install_shim(SHIM_FILE, SHIM_SOURCE).await?;

        let invocation = ChildInvocation::default()
            .args(&self.config.extra_args)
            .arg(shim)
            .env(PATTERN_ENV, self.pattern());

        let status = run_child(&self.config, invocation, ctx, scope).await?;
        let report: DiscoveryReport = read_report(ctx, Framework::Unittest, &status).await?;

        info!(
            tests_run = report.tests_run,
            failures = report.failures.len(),
            errors = report.errors.len(),
            "Discovery suite finished"
        );

        Ok(report.into_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_maps_failures_and_errors() {
        let report: DiscoveryReport = serde_json::from_str(
            r#"{
                "tests_run": 5,
                "failures": [{"id": "test_a.T.test_add", "detail": "AssertionError: 2 != 3"}],
                "errors": [{"id": "test_a.T.test_div", "detail": "ZeroDivisionError"}],
                "unexpected_successes": ["test_a.T.test_known_bug"]
            }"#,
        )
        .unwrap();

        let raw = report.into_raw();

        assert_eq!(raw.total, 5);
        assert_eq!(raw.failing_count(), 3);
        assert_eq!(raw.records[0].outcome, TestOutcome::Failed);
        assert_eq!(raw.records[1].outcome, TestOutcome::Errored);
        assert_eq!(raw.records[1].detail.as_deref(), Some("ZeroDivisionError"));
        assert_eq!(raw.records[2].id, "test_a.T.test_known_bug");
        assert_eq!(raw.coverage, Coverage::NotCollected);
    }

    #[test]
    fn test_clean_run_has_no_records() {
        let report: DiscoveryReport = serde_json::from_str(r#"{"tests_run": 4}"#).unwrap();
        let raw = report.into_raw();
        assert_eq!(raw.total, 4);
        assert!(raw.records.is_empty());
    }

    #[test]
    fn test_pattern_defaults() {
        let mut config = FrameworkConfig::builtin(Framework::Unittest);
        config.pattern = None;
        assert_eq!(UnittestAdapter::new(config).pattern(), DEFAULT_PATTERN);
    }
}
