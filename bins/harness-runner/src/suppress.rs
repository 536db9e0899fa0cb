/// Suppression Scope
///
/// Standard output belongs to the verdict line alone. While tests run, the
/// framework and the student's code may print anything, so their streams
/// are routed to a sink chosen here instead of the harness's own stdout and
/// stderr.
///
/// The scope is an explicit guard threaded into the adapters rather than a
/// global redirection: adapters can only obtain child `Stdio` handles from
/// it. Exactly one scope may be held per process; dropping the guard (on
/// success, error or unwind) releases it.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::debug;

static SCOPE_HELD: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
pub enum SuppressionError {
    #[error("output suppression is already active in this process")]
    AlreadyActive,

    #[error("failed to open capture file {}: {source}", .path.display())]
    CaptureFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where suppressed output ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    /// The null device
    Discard,
    /// Appended to a diagnostics file, never to the harness's stdout
    Append(PathBuf),
}

impl OutputSink {
    pub fn from_capture_file(path: Option<&Path>) -> Self {
        match path {
            Some(path) => OutputSink::Append(path.to_path_buf()),
            None => OutputSink::Discard,
        }
    }
}

#[derive(Debug)]
pub struct SuppressionScope {
    capture: Option<File>,
}

impl SuppressionScope {
    /// Claim the process-wide scope. Fails if another scope is held.
    pub fn enter(sink: &OutputSink) -> Result<Self, SuppressionError> {
        if SCOPE_HELD
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SuppressionError::AlreadyActive);
        }

        let capture = match sink {
            OutputSink::Discard => None,
            OutputSink::Append(path) => {
                match OpenOptions::new().create(true).append(true).open(path) {
                    Ok(file) => Some(file),
                    Err(source) => {
                        SCOPE_HELD.store(false, Ordering::Release);
                        return Err(SuppressionError::CaptureFile {
                            path: path.clone(),
                            source,
                        });
                    }
                }
            }
        };

        debug!(sink = ?sink, "Output suppression entered");
        Ok(Self { capture })
    }

    /// Whether any scope is currently held in this process
    pub fn is_active() -> bool {
        SCOPE_HELD.load(Ordering::Acquire)
    }

    /// Handle for a child's standard output
    pub fn stdout(&self) -> io::Result<Stdio> {
        self.sink_stdio()
    }

    /// Handle for a child's standard error
    pub fn stderr(&self) -> io::Result<Stdio> {
        self.sink_stdio()
    }

    fn sink_stdio(&self) -> io::Result<Stdio> {
        match &self.capture {
            Some(file) => Ok(Stdio::from(file.try_clone()?)),
            None => Ok(Stdio::null()),
        }
    }
}

impl Drop for SuppressionScope {
    fn drop(&mut self) {
        SCOPE_HELD.store(false, Ordering::Release);
        debug!("Output suppression released");
    }
}
