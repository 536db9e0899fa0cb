/// Test Framework Adapter - Abstraction for Test Execution
///
/// **Core Responsibility:**
/// Run the materialized test suite under one framework and return a raw,
/// framework-specific result.
///
/// **Critical Architectural Boundary:**
/// - Adapters know HOW a framework runs and how it reports
/// - Adapters do NOT compute scores or build verdicts
/// - Adapters return `RawResult` for the evaluator to normalize
///
/// Every variant drives a Python interpreter through a small shim that
/// writes a report file into a private scratch directory. The child's
/// stdout and stderr only ever come from the `SuppressionScope`.

use crate::config::FrameworkConfig;
use crate::driver::DriverAdapter;
use crate::error::HarnessError;
use crate::materializer::MaterializedRoots;
use crate::pytest::PytestAdapter;
use crate::suppress::SuppressionScope;
use crate::unittest::UnittestAdapter;
use async_trait::async_trait;
use harness_common::types::{Coverage, Framework, RawResult};
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const REPORT_ENV: &str = "HARNESS_REPORT";
pub const SEED_ENV: &str = "HARNESS_SEED";
const REPORT_FILE: &str = "report.json";

/// Uniform contract over the supported test frameworks
#[async_trait]
pub trait TestAdapter: Send + Sync {
    fn framework(&self) -> Framework;

    /// Run the suite to completion. `Err` means the harness could not
    /// complete; failing tests are part of an `Ok` result.
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        scope: &SuppressionScope,
    ) -> Result<RawResult, HarnessError>;
}

/// Pick the adapter for a configured framework
pub fn adapter_for(config: &FrameworkConfig) -> Box<dyn TestAdapter> {
    match config.name {
        Framework::Unittest => Box::new(UnittestAdapter::new(config.clone())),
        Framework::Pytest => Box::new(PytestAdapter::new(config.clone())),
        Framework::Driver => Box::new(DriverAdapter::new(config.clone())),
    }
}

/// Per-run state handed to an adapter
#[derive(Debug)]
pub struct ExecutionContext {
    pub roots: MaterializedRoots,
    pub coverage_requested: bool,
    scratch: TempDir,
}

impl ExecutionContext {
    pub fn new(roots: MaterializedRoots, coverage_requested: bool) -> Result<Self, HarnessError> {
        let scratch = tempfile::Builder::new()
            .prefix("harness-")
            .tempdir()
            .map_err(|e| HarnessError::crash(format!("failed to create scratch directory: {}", e)))?;

        Ok(Self {
            roots,
            coverage_requested,
            scratch,
        })
    }

    /// Private directory for shims and reports, outside both roots
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    pub fn report_path(&self) -> PathBuf {
        self.scratch.path().join(REPORT_FILE)
    }

    /// Write an embedded shim into the scratch directory
    pub async fn install_shim(&self, file_name: &str, source: &str) -> Result<PathBuf, HarnessError> {
        let path = self.scratch.path().join(file_name);
        tokio::fs::write(&path, source)
            .await
            .map_err(|e| HarnessError::crash(format!("failed to install {}: {}", file_name, e)))?;
        Ok(path)
    }

    /// Import path: solution code first, then tests, then the shims
    fn python_path(&self) -> Result<OsString, HarnessError> {
        std::env::join_paths([
            self.roots.code_root.as_path(),
            self.roots.tests_root.as_path(),
            self.scratch.path(),
        ])
        .map_err(|e| HarnessError::crash(format!("invalid PYTHONPATH entry: {}", e)))
    }
}

/// One interpreter invocation
#[derive(Debug, Default)]
pub struct ChildInvocation {
    pub args: Vec<OsString>,
    pub envs: Vec<(&'static str, String)>,
}

impl ChildInvocation {
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.envs.push((key, value.into()));
        self
    }
}

/// Run the configured interpreter inside the tests root and wait for it.
///
/// No timeout is applied here; the sandbox supervisor owns wall-clock limits.
pub async fn run_child(
    config: &FrameworkConfig,
    invocation: ChildInvocation,
    ctx: &ExecutionContext,
    scope: &SuppressionScope,
) -> Result<ExitStatus, HarnessError> {
    let stdio_error =
        |e: std::io::Error| HarnessError::crash(format!("failed to prepare child output: {}", e));

    let mut command = Command::new(&config.python);
    command
        .args(&invocation.args)
        .current_dir(&ctx.roots.tests_root)
        .env("PYTHONPATH", ctx.python_path()?)
        .env("PYTHONDONTWRITEBYTECODE", "1")
        .env(REPORT_ENV, ctx.report_path())
        .stdin(Stdio::null())
        .stdout(scope.stdout().map_err(stdio_error)?)
        .stderr(scope.stderr().map_err(stdio_error)?)
        .kill_on_drop(true);

    if let Some(seed) = config.seed {
        command.env(SEED_ENV, seed.to_string());
    }
    for (key, value) in &invocation.envs {
        command.env(key, value);
    }

    debug!(
        python = %config.python,
        args = ?invocation.args,
        cwd = %ctx.roots.tests_root.display(),
        "Spawning test interpreter"
    );

    let start = Instant::now();
    let status = command.status().await.map_err(|e| {
        HarnessError::crash(format!("failed to start interpreter '{}': {}", config.python, e))
    })?;

    info!(
        framework = %config.name,
        exit_code = ?status.code(),
        execution_ms = start.elapsed().as_millis() as u64,
        "Test interpreter exited"
    );

    Ok(status)
}

/// Human-readable exit status for error messages
pub fn describe_status(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "termination by signal".to_string(),
    }
}

/// Read and parse the shim's JSON report.
///
/// A missing or unreadable report means the shim itself died, which is a
/// harness-level failure rather than a test failure.
pub async fn read_report<T: DeserializeOwned>(
    ctx: &ExecutionContext,
    framework: Framework,
    status: &ExitStatus,
) -> Result<T, HarnessError> {
    let text = read_report_text(ctx, framework, status).await?;
    serde_json::from_str(&text).map_err(|e| {
        HarnessError::crash(format!("{} produced an unreadable report: {}", framework, e))
    })
}

pub async fn read_report_text(
    ctx: &ExecutionContext,
    framework: Framework,
    status: &ExitStatus,
) -> Result<String, HarnessError> {
    tokio::fs::read_to_string(ctx.report_path())
        .await
        .map_err(|_| {
            HarnessError::crash(format!(
                "{} runner exited with {} without producing a report",
                framework,
                describe_status(status)
            ))
        })
}

/// Load a JSON coverage sidecar. Missing or malformed reports are `Unavailable`.
pub async fn read_coverage(path: &Path) -> Coverage {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(_) => {
            debug!(path = %path.display(), "No coverage report");
            return Coverage::Unavailable;
        }
    };

    match serde_json::from_str(&text) {
        Ok(report) => Coverage::Report(report),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring malformed coverage report");
            Coverage::Unavailable
        }
    }
}
