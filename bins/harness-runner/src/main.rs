mod config;
mod driver;
mod engine;
mod error;
mod evaluator;
mod executor;
mod materializer;
mod pytest;
mod suppress;
mod unittest;


use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use config::{FrameworkConfigManager, HarnessConfig};
use error::HarnessError;
use futures_util::FutureExt;
use harness_common::job::InputChannel;
use harness_common::types::Framework;
use harness_common::verdict::Verdict;
use std::any::Any;
use std::fs::OpenOptions;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputKind {
    /// One line on standard input
    Stdin,
    /// An environment variable (see --input-var)
    Env,
}

#[derive(Debug, Parser)]
#[command(name = "harness-runner")]
#[command(about = "Run a submission's tests inside the sandbox and print one verdict line", long_about = None)]
struct Cli {
    /// Test framework the tests are written for (unittest, pytest, driver)
    #[arg(long, env = "HARNESS_FRAMEWORK", default_value = "pytest")]
    framework: Framework,

    /// Channel the job description is read from
    #[arg(long, env = "HARNESS_INPUT", value_enum, default_value = "stdin")]
    input: InputKind,

    /// Environment variable holding the job description when --input=env
    #[arg(long, env = "HARNESS_INPUT_VAR", default_value = "JOB_DESCRIPTION")]
    input_var: String,

    /// Framework config file (defaults to config/frameworks.json, then built-ins)
    #[arg(long, env = "HARNESS_CONFIG")]
    config: Option<PathBuf>,

    /// Where solution files are written
    #[arg(long, env = "HARNESS_CODE_ROOT", default_value = "../code")]
    code_root: PathBuf,

    /// Where test files are written
    #[arg(long, env = "HARNESS_TESTS_ROOT", default_value = "../tests")]
    tests_root: PathBuf,

    /// Append test output here instead of discarding it
    #[arg(long, env = "HARNESS_CAPTURE_FILE")]
    capture_file: Option<PathBuf>,

    /// Write logs to this file; logging is off without it
    #[arg(long, env = "HARNESS_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, env = "HARNESS_LOG_JSON", default_value_t = false)]
    log_json: bool,
}

impl Cli {
    fn input_channel(&self) -> InputChannel {
        match self.input {
            InputKind::Stdin => InputChannel::Stdin,
            InputKind::Env => InputChannel::Env(self.input_var.clone()),
        }
    }

    fn resolve(&self) -> Result<HarnessConfig, HarnessError> {
        let manager = match &self.config {
            Some(path) => FrameworkConfigManager::load(path)?,
            None => FrameworkConfigManager::load_default()?,
        };

        let framework = manager.get_config(&self.framework).map_err(|e| {
            warn!(available = ?manager.list_frameworks(), "Framework is not configured");
            e
        })?;

        Ok(HarnessConfig {
            framework: framework.clone(),
            input: self.input_channel(),
            code_root: self.code_root.clone(),
            tests_root: self.tests_root.clone(),
            capture_file: self.capture_file.clone(),
        })
    }
}

/// Logs never touch stdout (verdict) or stderr (treated as a failure by
/// the backend), so they only go to a file when one is configured.
fn init_tracing(log_file: Option<&Path>, json: bool) -> Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_line_number(true);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn run(cli: Cli) -> Verdict {
    if let Err(e) = init_tracing(cli.log_file.as_deref(), cli.log_json) {
        return Verdict::error(format!("{:#}", e));
    }

    // The default hook prints to stderr
    std::panic::set_hook(Box::new(|info| {
        error!(panic = %info, "Harness panicked");
    }));

    let run_id = Uuid::new_v4();
    let span = info_span!("harness", run_id = %run_id, framework = %cli.framework);

    async move {
        info!("Harness runner starting");

        let config = match cli.resolve() {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "Invalid harness configuration");
                return evaluator::evaluate_error(&e);
            }
        };

        let verdict = AssertUnwindSafe(executor::run(&config))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Verdict::error(format!("harness panicked: {}", panic_message(payload.as_ref())))
            });

        info!(status = ?verdict.status(), "Harness runner finished");
        verdict
    }
    .instrument(span)
    .await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let verdict = match Cli::try_parse() {
        Ok(cli) => run(cli).await,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let reason = e.to_string();
            let first_line = reason.lines().next().unwrap_or("invalid arguments");
            Verdict::error(format!("invalid harness arguments: {}", first_line))
        }
    };

    let stdout = std::io::stdout();
    verdict
        .emit(stdout.lock())
        .context("failed to write verdict")?;
    Ok(())
}
