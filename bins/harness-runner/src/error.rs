use crate::config::ConfigError;
use crate::materializer::MaterializationError;
use crate::suppress::SuppressionError;
use harness_common::job::DecodeError;
use thiserror::Error;

/// Everything that turns a run into an ERROR verdict.
///
/// Test failures are not errors; they reach the evaluator as part of a
/// completed raw result. The `Display` text of this type is the verdict's
/// `error` string.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Materialization(#[from] MaterializationError),

    #[error("{0}")]
    Suppression(#[from] SuppressionError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The framework could not complete: an exception escaped the test
    /// driver, the interpreter could not start, or the exit code says so
    #[error("{0}")]
    Crash(String),
}

impl HarnessError {
    pub fn crash(message: impl Into<String>) -> Self {
        HarnessError::Crash(message.into())
    }

    /// Short class name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Decode(_) => "decode",
            HarnessError::Materialization(_) => "materialization",
            HarnessError::Suppression(_) => "suppression",
            HarnessError::Config(_) => "config",
            HarnessError::Crash(_) => "crash",
        }
    }
}
