/// Result Normalizer - Framework-Agnostic Verdict Logic
///
/// **Core Responsibility:**
/// Turn a raw adapter result, or the reason the harness could not finish,
/// into the single canonical `Verdict`.
///
/// **Critical Properties:**
/// - Knows nothing about Python or any test framework
/// - Knows nothing about the filesystem or child processes
/// - Pure function: (raw result | harness error) → verdict
///
/// **Rules:**
/// - amount = tests the framework considered
/// - score = amount - failing tests (failed and errored count alike)
/// - PASS when nothing failed, FAIL when something failed, ERROR when the
///   harness did not complete or nothing ran at all
/// - failed entries read `id: <test id> output: <detail>` in report order
/// - coverage: the report when readable, `null` when the framework collects
///   coverage but none could be read, omitted otherwise

use crate::error::HarnessError;
use harness_common::types::{Coverage, RawResult, TestRecord};
use harness_common::verdict::Verdict;
use serde_json::Value;
use tracing::info;

pub const NO_TESTS_MESSAGE: &str = "no tests were run";

/// Render one failing test for the verdict's `failed` list
pub fn format_failure(record: &TestRecord) -> String {
    format!(
        "id: {} output: {}",
        record.id,
        record.detail.as_deref().unwrap_or_default()
    )
}

fn coverage_field(coverage: &Coverage) -> Option<Value> {
    match coverage {
        Coverage::NotCollected => None,
        Coverage::Unavailable => Some(Value::Null),
        Coverage::Report(report) => Some(report.clone()),
    }
}

/// Normalize a completed run
pub fn evaluate(raw: &RawResult) -> Verdict {
    let failed: Vec<String> = raw.failing().map(format_failure).collect();

    // A framework that under-reports its total must not push score below zero
    let amount = raw.total.max(failed.len());

    if amount == 0 {
        return Verdict::error(NO_TESTS_MESSAGE);
    }

    let coverage = coverage_field(&raw.coverage);
    if failed.is_empty() {
        Verdict::pass(amount, coverage)
    } else {
        Verdict::fail(amount, failed, coverage)
    }
}

/// Normalize a run that could not complete
pub fn evaluate_error(error: &HarnessError) -> Verdict {
    Verdict::error(error.to_string())
}

/// Entry point: either outcome of an adapter run becomes a verdict
pub fn normalize(outcome: Result<RawResult, HarnessError>) -> Verdict {
    let verdict = match outcome {
        Ok(raw) => evaluate(&raw),
        Err(e) => evaluate_error(&e),
    };

    info!(
        status = ?verdict.status(),
        amount = verdict.amount(),
        score = ?verdict.score(),
        "Evaluation complete"
    );

    verdict
}
