/// Hook-based adapter: pytest with a per-phase report plugin
///
/// **Aggregation rule:**
/// pytest reports each test up to three times (setup, call, teardown).
/// Per node id the latest report is kept, except that a failure is never
/// replaced: once any phase failed, the test stays failed. A teardown
/// failure after a passing call therefore still fails the test.
///
/// **Exit codes:**
/// - 0 / 1: the run completed, collected reports are authoritative
/// - anything else: the harness could not complete, see `PytestExit`

use crate::config::FrameworkConfig;
use crate::engine::{
    describe_status, read_coverage, read_report_text, run_child, ChildInvocation,
    ExecutionContext, TestAdapter,
};
use crate::error::HarnessError;
use crate::suppress::SuppressionScope;
use async_trait::async_trait;
use harness_common::types::{Coverage, Framework, RawResult, TestOutcome, TestRecord};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitStatus;
use tracing::{info, instrument, warn};

const PLUGIN_MODULE: &str = "harness_pytest_plugin";
const PLUGIN_SOURCE: &str = include_str!("../shims/pytest_plugin.py");
const DEFAULT_PATTERN: &str = "*test*.py";
pub const COVERAGE_FILE: &str = "coverage.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Setup,
    Call,
    Teardown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseOutcome {
    Passed,
    Failed,
    Skipped,
}

/// One line of the plugin's report file
#[derive(Debug, Clone, Deserialize)]
pub struct PhaseReport {
    pub nodeid: String,
    pub when: Phase,
    pub outcome: PhaseOutcome,
    #[serde(default)]
    pub longrepr: Option<String>,
}

/// Folds phase reports into one record per test, in first-seen order
#[derive(Debug, Default)]
pub struct PhaseAggregator {
    order: Vec<String>,
    latest: HashMap<String, PhaseReport>,
}

impl PhaseAggregator {
    pub fn observe(&mut self, report: PhaseReport) {
        match self.latest.get(&report.nodeid) {
            Some(stored) if stored.outcome == PhaseOutcome::Failed => {}
            Some(_) => {
                self.latest.insert(report.nodeid.clone(), report);
            }
            None => {
                self.order.push(report.nodeid.clone());
                self.latest.insert(report.nodeid.clone(), report);
            }
        }
    }

    /// Parse the JSON-lines report written by the plugin
    pub fn from_lines(text: &str) -> Result<Self, serde_json::Error> {
        let mut aggregator = Self::default();
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            aggregator.observe(serde_json::from_str(line)?);
        }
        Ok(aggregator)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn into_records(mut self) -> Vec<TestRecord> {
        self.order
            .iter()
            .filter_map(|nodeid| self.latest.remove(nodeid))
            .map(|report| match report.outcome {
                PhaseOutcome::Failed => {
                    let outcome = if report.when == Phase::Call {
                        TestOutcome::Failed
                    } else {
                        TestOutcome::Errored
                    };
                    TestRecord::failing(report.nodeid, outcome, report.longrepr.unwrap_or_default())
                }
                PhaseOutcome::Passed | PhaseOutcome::Skipped => TestRecord::passed(report.nodeid),
            })
            .collect()
    }
}

/// How a pytest process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PytestExit {
    AllPassed,
    TestsFailed,
    Interrupted,
    InternalError,
    UsageError,
    NoTestsCollected,
    Other(i32),
    Signaled,
}

impl PytestExit {
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => PytestExit::AllPassed,
            Some(1) => PytestExit::TestsFailed,
            Some(2) => PytestExit::Interrupted,
            Some(3) => PytestExit::InternalError,
            Some(4) => PytestExit::UsageError,
            Some(5) => PytestExit::NoTestsCollected,
            Some(other) => PytestExit::Other(other),
            None => PytestExit::Signaled,
        }
    }

    pub fn from_status(status: &ExitStatus) -> Self {
        Self::from_code(status.code())
    }

    /// Whether the collected reports can be trusted
    pub fn completed(&self) -> bool {
        matches!(self, PytestExit::AllPassed | PytestExit::TestsFailed)
    }

    /// Verdict error text for runs that did not complete
    pub fn error_message(&self) -> Option<String> {
        let (code, text) = match self {
            PytestExit::AllPassed | PytestExit::TestsFailed => return None,
            PytestExit::Signaled => return Some("pytest was terminated by a signal".to_string()),
            PytestExit::Interrupted => (
                2,
                "Test execution was interrupted by the user / error importing tests",
            ),
            PytestExit::InternalError => (3, "Internal error happened while executing tests"),
            PytestExit::UsageError => (4, "pytest command line usage error"),
            PytestExit::NoTestsCollected => (5, "no tests were collected"),
            PytestExit::Other(code) => (*code, "unknown exit condition"),
        };
        Some(format!("pytest returned exit code {}: {}", code, text))
    }
}

pub struct PytestAdapter {
    config: FrameworkConfig,
}

impl PytestAdapter {
    pub fn new(config: FrameworkConfig) -> Self {
        Self { config }
    }

    fn pattern(&self) -> &str {
        self.config.pattern.as_deref().unwrap_or(DEFAULT_PATTERN)
    }

    fn collect_coverage(&self, ctx: &ExecutionContext) -> bool {
        self.config.coverage || ctx.coverage_requested
    }

    /// Lives in the scratch directory, outside both roots
    fn coverage_path(&self, ctx: &ExecutionContext) -> PathBuf {
        ctx.scratch_dir().join(COVERAGE_FILE)
    }

    fn invocation(&self, ctx: &ExecutionContext) -> ChildInvocation {
        let mut invocation = ChildInvocation::default()
            .args(["-m", "pytest", "-p", PLUGIN_MODULE, "-p", "no:cacheprovider", "-o"])
            .arg(format!("python_files={}", self.pattern()));

        if self.collect_coverage(ctx) {
            let report = self.coverage_path(ctx);
            invocation = invocation
                .arg(format!("--cov={}", ctx.roots.code_root.display()))
                .arg(format!("--cov-report=json:{}", report.display()));
        }

        invocation.args(&self.config.extra_args).arg(".")
    }
}

#[async_trait]
impl TestAdapter for PytestAdapter {
    fn framework(&self) -> Framework {
        Framework::Pytest
    }

    #[instrument(skip_all, fields(framework = "pytest", coverage = self.collect_coverage(ctx)))]
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        scope: &SuppressionScope,
    ) -> Result<RawResult, HarnessError> {
        ctx.install_shim(&format!("{}.py", PLUGIN_MODULE), PLUGIN_SOURCE)
            .await?;

        let status = run_child(&self.config, self.invocation(ctx), ctx, scope).await?;

        let exit = PytestExit::from_status(&status);
        if !exit.completed() {
            warn!(exit = ?exit, "pytest did not complete");
            let message = exit
                .error_message()
                .unwrap_or_else(|| format!("pytest exited with {}", describe_status(&status)));
            return Err(HarnessError::Crash(message));
        }

        let text = read_report_text(ctx, Framework::Pytest, &status).await?;
        let aggregator = PhaseAggregator::from_lines(&text).map_err(|e| {
            HarnessError::crash(format!("pytest produced an unreadable report: {}", e))
        })?;
        let total = aggregator.len();
        let records = aggregator.into_records();
        let coverage = if self.collect_coverage(ctx) {
            read_coverage(&self.coverage_path(ctx)).await
        } else {
            Coverage::Unavailable
        };

        info!(
            exit = ?exit,
            tests = total,
            failing = records.iter().filter(|r| r.outcome.is_failing()).count(),
            "pytest run finished"
        );

        Ok(RawResult {
            total,
            records,
            coverage,
        })
    }
}
