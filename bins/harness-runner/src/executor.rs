/// Job Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Run one job end to end and produce its verdict.
///
/// **Pipeline:**
/// 1. Decode the job description (harness-common)
/// 2. Materialize every file (materializer.rs); nothing runs unless this
///    finished completely
/// 3. Execute the suite with the configured adapter inside a
///    `SuppressionScope` (engine.rs)
/// 4. Normalize the outcome into a verdict (evaluator.rs)
///
/// This module is the glue layer - it knows nothing about:
/// - How a framework runs (the adapters' job)
/// - How scoring works (the evaluator's job)
///
/// Every failure is folded into the returned verdict; nothing propagates.

use crate::config::HarnessConfig;
use crate::engine::{adapter_for, ExecutionContext};
use crate::error::HarnessError;
use crate::evaluator;
use crate::materializer;
use crate::suppress::{OutputSink, SuppressionScope};
use harness_common::job::JobDescription;
use harness_common::types::RawResult;
use harness_common::verdict::Verdict;
use tracing::{info, instrument, warn};

/// Read the job from the configured channel and run it
pub async fn run(config: &HarnessConfig) -> Verdict {
    let raw_input = {
        let stdin = std::io::stdin();
        let mut handle = stdin.lock();
        config.input.read(&mut handle)
    };

    match raw_input {
        Ok(raw_input) => execute_job(&raw_input, config).await,
        Err(e) => {
            warn!(error = %e, channel = %config.input, "Could not read job description");
            evaluator::normalize(Err(e.into()))
        }
    }
}

/// Run an already-read job document
#[instrument(skip_all, fields(framework = %config.framework()))]
pub async fn execute_job(raw_input: &str, config: &HarnessConfig) -> Verdict {
    let outcome = run_pipeline(raw_input, config).await;
    if let Err(e) = &outcome {
        warn!(kind = e.kind(), error = %e, "Harness could not complete");
    }
    evaluator::normalize(outcome)
}

async fn run_pipeline(raw_input: &str, config: &HarnessConfig) -> Result<RawResult, HarnessError> {
    // Step 1: Decode
    let job = JobDescription::decode(raw_input)?;
    info!(
        solution_files = job.solution_files.len(),
        test_files = job.test_case_files.len(),
        total_files = job.file_count(),
        payload_bytes = job.payload_bytes(),
        coverage = ?job.coverage,
        "Decoded job description"
    );

    // Step 2: Materialize
    let roots = materializer::materialize(&job, &config.code_root, &config.tests_root).await?;
    let coverage_requested = job.coverage.unwrap_or(false);
    drop(job);

    // Step 3: Execute under suppression
    let ctx = ExecutionContext::new(roots, coverage_requested)?;
    let adapter = adapter_for(&config.framework);
    let sink = OutputSink::from_capture_file(config.capture_file.as_deref());
    info!(
        adapter = %adapter.framework(),
        scratch = %ctx.scratch_dir().display(),
        "Running test suite"
    );

    let scope = SuppressionScope::enter(&sink)?;
    let result = adapter.execute(&ctx, &scope).await;
    drop(scope);
    debug_assert!(!SuppressionScope::is_active());

    result
}
