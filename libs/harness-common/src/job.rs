/// Job Description - Input Contract
///
/// The backend packages a submission as one JSON document:
///
/// ```json
/// {
///   "solution_files": { "<relative-path>": "<base64>" },
///   "test_case_files": { "<relative-path>": "<base64>" },
///   "coverage": true
/// }
/// ```
///
/// Decoding is pure: it validates the document shape and base64 payloads
/// and hands back raw bytes. Path safety is checked later, when the files
/// are materialized against a concrete root.

use base64::{engine::general_purpose, Engine as _};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::env::VarError;
use std::io::BufRead;
use thiserror::Error;

pub const SOLUTION_FILES_KEY: &str = "solution_files";
pub const TEST_CASE_FILES_KEY: &str = "test_case_files";
pub const COVERAGE_KEY: &str = "coverage";

/// Relative path → file content
pub type FileMap = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("job description is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("job description must be a JSON object")]
    NotAnObject,

    #[error("job description is missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("'{0}' must map relative paths to base64 strings")]
    NotAMapping(&'static str),

    #[error("payload of '{path}' in '{key}' is not a string")]
    NotAString { key: &'static str, path: String },

    #[error("payload of '{path}' in '{key}' is not valid base64: {source}")]
    InvalidBase64 {
        key: &'static str,
        path: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("'coverage' must be a boolean")]
    InvalidCoverage,

    #[error("no job description received on {0}")]
    EmptyInput(String),

    #[error("environment variable '{0}' is not set")]
    MissingVariable(String),

    #[error("environment variable '{0}' is not valid UTF-8")]
    NotUnicode(String),

    #[error("failed to read job description: {0}")]
    Io(#[from] std::io::Error),
}

/// Decoded job, ready to be written to disk
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobDescription {
    pub solution_files: FileMap,
    pub test_case_files: FileMap,
    pub coverage: Option<bool>,
}

impl JobDescription {
    /// Parse a job document and decode every embedded payload
    pub fn decode(input: &str) -> Result<Self, DecodeError> {
        let document: Value = serde_json::from_str(input.trim())?;
        let object = document.as_object().ok_or(DecodeError::NotAnObject)?;

        let solution_files = decode_files(object, SOLUTION_FILES_KEY)?;
        let test_case_files = decode_files(object, TEST_CASE_FILES_KEY)?;

        let coverage = match object.get(COVERAGE_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::Bool(flag)) => Some(*flag),
            Some(_) => return Err(DecodeError::InvalidCoverage),
        };

        Ok(Self {
            solution_files,
            test_case_files,
            coverage,
        })
    }

    pub fn file_count(&self) -> usize {
        self.solution_files.len() + self.test_case_files.len()
    }

    pub fn payload_bytes(&self) -> usize {
        self.solution_files
            .values()
            .chain(self.test_case_files.values())
            .map(Vec::len)
            .sum()
    }
}

fn decode_files(object: &Map<String, Value>, key: &'static str) -> Result<FileMap, DecodeError> {
    let entries = object
        .get(key)
        .ok_or(DecodeError::MissingKey(key))?
        .as_object()
        .ok_or(DecodeError::NotAMapping(key))?;

    let mut files = FileMap::new();
    for (path, payload) in entries {
        let encoded = payload.as_str().ok_or_else(|| DecodeError::NotAString {
            key,
            path: path.clone(),
        })?;
        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|source| DecodeError::InvalidBase64 {
                key,
                path: path.clone(),
                source,
            })?;
        files.insert(path.clone(), bytes);
    }
    Ok(files)
}

/// Where the job document is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputChannel {
    /// A single line on standard input
    Stdin,
    /// The full value of an environment variable
    Env(String),
}

impl std::fmt::Display for InputChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputChannel::Stdin => f.write_str("standard input"),
            InputChannel::Env(name) => write!(f, "environment variable '{}'", name),
        }
    }
}

impl InputChannel {
    /// Read the raw job document. `reader` is only consulted for `Stdin`.
    pub fn read<R: BufRead>(&self, reader: &mut R) -> Result<String, DecodeError> {
        let raw = match self {
            InputChannel::Stdin => {
                let mut line = String::new();
                reader.read_line(&mut line)?;
                line
            }
            InputChannel::Env(name) => {
                std::env::var(name).map_err(|e| match e {
                    VarError::NotPresent => DecodeError::MissingVariable(name.clone()),
                    VarError::NotUnicode(_) => DecodeError::NotUnicode(name.clone()),
                })?
            }
        };

        if raw.trim().is_empty() {
            return Err(DecodeError::EmptyInput(self.to_string()));
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Cursor;

    fn encode(data: &[u8]) -> String {
        general_purpose::STANDARD.encode(data)
    }

    #[test]
    fn test_decode_roundtrips_bytes() {
        let source = b"def add(x, y):\n    return x + y\n\xff\x00";
        let doc = serde_json::json!({
            "solution_files": { "a.py": encode(source) },
            "test_case_files": { "sub/test_a.py": encode(b"import a\n") },
        });

        let job = JobDescription::decode(&doc.to_string()).unwrap();

        assert_eq!(job.solution_files["a.py"], source.to_vec());
        assert_eq!(job.test_case_files["sub/test_a.py"], b"import a\n".to_vec());
        assert_eq!(job.coverage, None);
        assert_eq!(job.file_count(), 2);
    }

    #[test]
    fn test_decode_coverage_flag() {
        let doc = r#"{"solution_files":{},"test_case_files":{},"coverage":true}"#;
        assert_eq!(JobDescription::decode(doc).unwrap().coverage, Some(true));

        let doc = r#"{"solution_files":{},"test_case_files":{},"coverage":null}"#;
        assert_eq!(JobDescription::decode(doc).unwrap().coverage, None);

        let doc = r#"{"solution_files":{},"test_case_files":{},"coverage":"yes"}"#;
        assert!(matches!(
            JobDescription::decode(doc),
            Err(DecodeError::InvalidCoverage)
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        assert!(matches!(
            JobDescription::decode("{not json"),
            Err(DecodeError::InvalidJson(_))
        ));
        assert!(matches!(
            JobDescription::decode("[1, 2]"),
            Err(DecodeError::NotAnObject)
        ));
    }

    #[test]
    fn test_decode_rejects_missing_keys() {
        let err = JobDescription::decode(r#"{"solution_files":{}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingKey(TEST_CASE_FILES_KEY)));
        assert!(err.to_string().contains("test_case_files"));

        let err = JobDescription::decode(r#"{"test_case_files":{}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingKey(SOLUTION_FILES_KEY)));
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        let doc = r#"{"solution_files":{"a.py":"!!not base64!!"},"test_case_files":{}}"#;
        let err = JobDescription::decode(doc).unwrap_err();

        match &err {
            DecodeError::InvalidBase64 { key, path, .. } => {
                assert_eq!(*key, SOLUTION_FILES_KEY);
                assert_eq!(path, "a.py");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("a.py"));
    }

    #[test]
    fn test_decode_rejects_non_string_payload() {
        let doc = r#"{"solution_files":{},"test_case_files":{"t.py":42}}"#;
        assert!(matches!(
            JobDescription::decode(doc),
            Err(DecodeError::NotAString { .. })
        ));
    }

    #[test]
    fn test_stdin_reads_single_line() {
        let mut input = Cursor::new("{\"a\":1}\nsecond line\n");
        let raw = InputChannel::Stdin.read(&mut input).unwrap();
        assert_eq!(raw.trim(), "{\"a\":1}");
    }

    #[test]
    fn test_stdin_empty_is_an_error() {
        let mut input = Cursor::new("");
        assert!(matches!(
            InputChannel::Stdin.read(&mut input),
            Err(DecodeError::EmptyInput(_))
        ));
    }

    #[test]
    #[serial]
    fn test_env_channel_reads_and_decodes() {
        let name = "HARNESS_TEST_JOB_DESCRIPTION";
        let doc = serde_json::json!({
            "solution_files": { "a.py": encode(b"x = 1\n") },
            "test_case_files": {},
            "coverage": true,
        });
        std::env::set_var(name, doc.to_string());

        let channel = InputChannel::Env(name.to_string());
        let mut unused = Cursor::new("ignored\n");
        let raw = channel.read(&mut unused);
        std::env::remove_var(name);

        let job = JobDescription::decode(&raw.unwrap()).unwrap();
        assert_eq!(job.solution_files["a.py"], b"x = 1\n".to_vec());
        assert_eq!(job.coverage, Some(true));
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_env_channel_rejects_non_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let name = "HARNESS_TEST_NON_UTF8_JOB";
        std::env::set_var(name, OsStr::from_bytes(b"{\xff}"));

        let channel = InputChannel::Env(name.to_string());
        let result = channel.read(&mut Cursor::new(""));
        std::env::remove_var(name);

        let err = result.unwrap_err();
        assert!(matches!(err, DecodeError::NotUnicode(_)));
        assert_eq!(
            err.to_string(),
            "environment variable 'HARNESS_TEST_NON_UTF8_JOB' is not valid UTF-8"
        );
    }

    #[test]
    #[serial]
    fn test_env_channel_missing_variable() {
        let channel = InputChannel::Env("HARNESS_TEST_SURELY_UNSET_VARIABLE".to_string());
        let mut unused = Cursor::new("");
        assert!(matches!(
            channel.read(&mut unused),
            Err(DecodeError::MissingVariable(_))
        ));
    }
}
