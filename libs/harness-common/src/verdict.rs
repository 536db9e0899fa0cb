/// Verdict - Output Contract
///
/// Exactly one verdict line is written to standard output per run:
///
/// ```json
/// {"status":"FAIL","amount":2,"score":1,"failed":["id: t output: ..."]}
/// ```
///
/// **Invariants (upheld by the constructors):**
/// - `score <= amount`
/// - `PASS` iff `score == amount` and `amount > 0`
/// - `failed.len() == amount - score` on `FAIL`
/// - `ERROR` never carries `score` or `failed`

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::io::{self, Write};

/// Written instead of a verdict that could not be serialized
pub const FALLBACK_ERROR_LINE: &str =
    r#"{"status":"ERROR","amount":0,"error":"verdict could not be serialized"}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictStatus {
    Pass,
    Fail,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    status: VerdictStatus,
    amount: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failed: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// `Some(Value::Null)` serializes as `"coverage":null`
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    coverage: Option<Value>,
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Verdict {
    /// Every considered test passed. `amount` must be non-zero.
    pub fn pass(amount: usize, coverage: Option<Value>) -> Self {
        debug_assert!(amount > 0, "a PASS verdict needs at least one test");
        Self {
            status: VerdictStatus::Pass,
            amount,
            score: Some(amount),
            failed: None,
            error: None,
            coverage,
        }
    }

    /// The suite ran and `failed.len()` of `amount` tests did not pass
    pub fn fail(amount: usize, failed: Vec<String>, coverage: Option<Value>) -> Self {
        debug_assert!(!failed.is_empty() && failed.len() <= amount);
        Self {
            status: VerdictStatus::Fail,
            amount,
            score: Some(amount.saturating_sub(failed.len())),
            failed: Some(failed),
            error: None,
            coverage,
        }
    }

    /// The harness could not complete the run
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Error,
            amount: 0,
            score: None,
            failed: None,
            error: Some(message.into()),
            coverage: None,
        }
    }

    pub fn status(&self) -> VerdictStatus {
        self.status
    }

    pub fn amount(&self) -> usize {
        self.amount
    }

    pub fn score(&self) -> Option<usize> {
        self.score
    }

    pub fn failed(&self) -> &[String] {
        self.failed.as_deref().unwrap_or_default()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn coverage(&self) -> Option<&Value> {
        self.coverage.as_ref()
    }

    /// Compact single-line JSON rendering
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Write the verdict as the one and only line of `out`
    pub fn emit<W: Write>(&self, mut out: W) -> io::Result<()> {
        let line = self
            .to_line()
            .unwrap_or_else(|_| FALLBACK_ERROR_LINE.to_string());
        writeln!(out, "{}", line)?;
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pass_shape() {
        let verdict = Verdict::pass(3, None);
        assert_eq!(
            verdict.to_line().unwrap(),
            r#"{"status":"PASS","amount":3,"score":3}"#
        );
    }

    #[test]
    fn test_fail_shape() {
        let verdict = Verdict::fail(2, vec!["id: t output: boom".to_string()], None);
        assert_eq!(verdict.score(), Some(1));
        assert_eq!(
            verdict.to_line().unwrap(),
            r#"{"status":"FAIL","amount":2,"score":1,"failed":["id: t output: boom"]}"#
        );
    }

    #[test]
    fn test_error_never_carries_score() {
        let verdict = Verdict::error("pytest returned exit code 5: no tests were collected");
        let value: Value = serde_json::from_str(&verdict.to_line().unwrap()).unwrap();

        assert_eq!(value["status"], "ERROR");
        assert_eq!(value["amount"], 0);
        assert!(value.get("score").is_none());
        assert!(value.get("failed").is_none());
        assert!(value.get("coverage").is_none());
        assert!(value["error"].as_str().unwrap().contains("exit code 5"));
    }

    #[test]
    fn test_coverage_null_is_kept() {
        let verdict = Verdict::pass(1, Some(Value::Null));
        assert_eq!(
            verdict.to_line().unwrap(),
            r#"{"status":"PASS","amount":1,"score":1,"coverage":null}"#
        );

        let parsed: Verdict = serde_json::from_str(&verdict.to_line().unwrap()).unwrap();
        assert_eq!(parsed.coverage(), Some(&Value::Null));
    }

    #[test]
    fn test_coverage_object() {
        let report = json!({"totals": {"percent_covered": 87.5}});
        let verdict = Verdict::pass(1, Some(report.clone()));
        let parsed: Verdict = serde_json::from_str(&verdict.to_line().unwrap()).unwrap();
        assert_eq!(parsed, verdict);
        assert_eq!(parsed.coverage(), Some(&report));
    }

    #[test]
    fn test_emit_writes_one_line() {
        let mut out = Vec::new();
        Verdict::pass(2, None).emit(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_fallback_line_is_an_error_verdict() {
        let parsed: Verdict = serde_json::from_str(FALLBACK_ERROR_LINE).unwrap();
        assert_eq!(parsed.status(), VerdictStatus::Error);
    }
}
