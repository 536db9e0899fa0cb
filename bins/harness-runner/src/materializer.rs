/// Filesystem Materializer
///
/// **Responsibility:**
/// Write decoded solution and test files under their designated roots.
///
/// **Rules:**
/// - Every path is validated before the first byte is written; one bad
///   path means nothing is written at all
/// - Only plain relative paths are accepted (no absolute paths, no `..`)
/// - Intermediate directories are created as needed
/// - The sandbox is assumed fresh; existing files are overwritten
///
/// Any failure here aborts the run before a test framework is started.

use harness_common::job::{FileMap, JobDescription};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum MaterializationError {
    #[error("path '{path}' in {root} files is not a safe relative path")]
    UnsafePath { root: &'static str, path: String },

    #[error("path '{path}' resolves outside the {root} root")]
    EscapesRoot { root: &'static str, path: String },

    #[error("failed to create directory {}: {source}", .dir.display())]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Absolute roots the files were written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedRoots {
    pub code_root: PathBuf,
    pub tests_root: PathBuf,
}

/// Validate a job-supplied path and return it as a clean relative path.
///
/// `.` components are dropped; anything that could leave the root returns
/// `None`.
pub fn safe_relative_path(raw: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

fn plan<'a>(
    root: &'static str,
    files: &'a FileMap,
) -> Result<Vec<(PathBuf, &'a [u8])>, MaterializationError> {
    files
        .iter()
        .map(|(path, bytes)| {
            safe_relative_path(path)
                .map(|relative| (relative, bytes.as_slice()))
                .ok_or_else(|| MaterializationError::UnsafePath {
                    root,
                    path: path.clone(),
                })
        })
        .collect()
}

async fn prepare_root(root: &Path) -> Result<PathBuf, MaterializationError> {
    fs::create_dir_all(root)
        .await
        .map_err(|source| MaterializationError::CreateDir {
            dir: root.to_path_buf(),
            source,
        })?;
    fs::canonicalize(root)
        .await
        .map_err(|source| MaterializationError::CreateDir {
            dir: root.to_path_buf(),
            source,
        })
}

async fn write_all(
    root_name: &'static str,
    root: &Path,
    entries: Vec<(PathBuf, &[u8])>,
) -> Result<(), MaterializationError> {
    for (relative, bytes) in entries {
        let target = root.join(&relative);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| MaterializationError::CreateDir {
                    dir: parent.to_path_buf(),
                    source,
                })?;

            // A pre-existing symlinked directory could still point elsewhere
            let resolved = fs::canonicalize(parent)
                .await
                .map_err(|source| MaterializationError::CreateDir {
                    dir: parent.to_path_buf(),
                    source,
                })?;
            if !resolved.starts_with(root) {
                return Err(MaterializationError::EscapesRoot {
                    root: root_name,
                    path: relative.display().to_string(),
                });
            }
        }

        fs::write(&target, bytes)
            .await
            .map_err(|source| MaterializationError::Write {
                path: target.clone(),
                source,
            })?;

        debug!(path = %target.display(), bytes = bytes.len(), "Materialized file");
    }
    Ok(())
}

/// Write every file of `job` below `code_root` and `tests_root`
#[instrument(skip(job), fields(files = job.file_count()))]
pub async fn materialize(
    job: &JobDescription,
    code_root: &Path,
    tests_root: &Path,
) -> Result<MaterializedRoots, MaterializationError> {
    let solution_plan = plan("code", &job.solution_files)?;
    let test_plan = plan("tests", &job.test_case_files)?;

    let code_root = prepare_root(code_root).await?;
    let tests_root = prepare_root(tests_root).await?;

    write_all("code", &code_root, solution_plan).await?;
    write_all("tests", &tests_root, test_plan).await?;

    info!(
        code_root = %code_root.display(),
        tests_root = %tests_root.display(),
        solution_files = job.solution_files.len(),
        test_files = job.test_case_files.len(),
        payload_bytes = job.payload_bytes(),
        "Materialization complete"
    );

    Ok(MaterializedRoots {
        code_root,
        tests_root,
    })
}
