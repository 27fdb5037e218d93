#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Student submissions and where to find them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::warn;

use crate::util::find_files;

/// One student's source file. Never modified by grading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Student identity (the file stem).
    identity: String,
    /// The file's bytes, exactly as read.
    bytes:    Vec<u8>,
    /// Source text for display and review; undecodable bytes are replaced.
    source:   String,
    /// File the source was read from, when it came from disk.
    path:     Option<PathBuf>,
}

impl Submission {
    /// Creates an in-memory submission.
    pub fn new(identity: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            identity: identity.into(),
            bytes: source.clone().into_bytes(),
            source,
            path: None,
        }
    }

    /// Reads a submission from a file; the identity is the file stem.
    pub fn from_path(path: &Path) -> Result<Self> {
        let identity = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .with_context(|| format!("Cannot derive a student name from {}", path.display()))?
            .to_string();
        let bytes =
            std::fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
        let source = String::from_utf8_lossy(&bytes).into_owned();

        Ok(Self {
            identity,
            bytes,
            source,
            path: Some(path.to_path_buf()),
        })
    }

    /// Returns the student identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Returns the source text. Bytes that are not UTF-8 show up as U+FFFD;
    /// use [`Submission::bytes`] to execute the submission.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the file's raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the file the submission was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Collects every `*.py` file directly inside `dir`, sorted by file name.
/// Unreadable files are logged and skipped.
pub fn discover_submissions(dir: &Path) -> Result<Vec<Submission>> {
    if !dir.is_dir() {
        bail!("Submission directory {} does not exist", dir.display());
    }

    let submissions = find_files("py", 0, dir)?
        .into_iter()
        .filter_map(|path| match Submission::from_path(&path) {
            Ok(submission) => Some(submission),
            Err(err) => {
                warn!("Skipping {}: {err:#}", path.display());
                None
            }
        })
        .collect();

    Ok(submissions)
}
