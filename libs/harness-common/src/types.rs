use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Test framework a runner image is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// Pattern-based discovery of `unittest` suites
    Unittest,
    /// `pytest` with a per-phase report hook
    Pytest,
    /// A `run_tests()` entry point written by the course staff
    Driver,
}

impl Framework {
    pub const ALL: [Framework; 3] = [Framework::Unittest, Framework::Pytest, Framework::Driver];

    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Unittest => "unittest",
            Framework::Pytest => "pytest",
            Framework::Driver => "driver",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unittest" => Ok(Framework::Unittest),
            "pytest" => Ok(Framework::Pytest),
            "driver" | "custom" => Ok(Framework::Driver),
            other => Err(format!(
                "unknown framework '{}' (valid options: unittest, pytest, driver)",
                other
            )),
        }
    }
}

/// Outcome of a single test as reported by its framework.
///
/// `Failed` and `Errored` are kept apart for logging only; both count
/// against the score in exactly the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed,
    Errored,
}

impl TestOutcome {
    pub fn is_failing(&self) -> bool {
        !matches!(self, TestOutcome::Passed)
    }
}

/// One test as seen by an adapter
#[derive(Debug, Clone, PartialEq)]
pub struct TestRecord {
    pub id: String,
    pub outcome: TestOutcome,
    pub detail: Option<String>,
}

impl TestRecord {
    pub fn passed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outcome: TestOutcome::Passed,
            detail: None,
        }
    }

    pub fn failing(id: impl Into<String>, outcome: TestOutcome, detail: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outcome,
            detail: Some(detail.into()),
        }
    }
}

/// Coverage state attached to a raw result
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Coverage {
    /// The framework does not collect coverage at all
    #[default]
    NotCollected,
    /// Coverage was expected but no readable report exists
    Unavailable,
    Report(serde_json::Value),
}

/// Framework-specific result of one completed run.
///
/// `records` may hold every test (hook-based runs) or only the failing ones
/// (discovery runs only report failures individually); `total` is always
/// the number of tests the framework ran.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawResult {
    pub total: usize,
    pub records: Vec<TestRecord>,
    pub coverage: Coverage,
}

impl RawResult {
    pub fn failing(&self) -> impl Iterator<Item = &TestRecord> {
        self.records.iter().filter(|r| r.outcome.is_failing())
    }

    pub fn failing_count(&self) -> usize {
        self.failing().count()
    }
}
