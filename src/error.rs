#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Error types shared across the grading pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Problems with a test specification file. These abort the grading run
/// before any submission is touched.
#[derive(Error, Debug)]
pub enum SpecError {
    /// The file could not be read.
    #[error("Could not read test specification `{path}`: {source}")]
    Read {
        /// Path that was read.
        path:   PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid JSON for a test specification.
    #[error("Could not parse test specification `{path}`: {source}")]
    Parse {
        /// Path that was parsed.
        path:   PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// The specification declares no tests.
    #[error("The test specification declares no tests.")]
    Empty,
    /// Two tests share the same name.
    #[error("Test name `{0}` is declared more than once.")]
    DuplicateTest(String),
    /// A test is malformed.
    #[error("Test `{test}` is invalid: {reason}")]
    InvalidTest {
        /// Name of the offending test.
        test:   String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Failures talking to the external review service.
#[derive(Error, Debug)]
pub enum ReviewError {
    /// The request never produced an HTTP response (connection refused, DNS,
    /// request timeout).
    #[error("Review request failed to complete: {0}")]
    Transport(String),
    /// The service rejected the shared secret.
    #[error("Review service rejected the credentials (HTTP {status})")]
    Unauthorized {
        /// HTTP status code returned.
        status: u16,
    },
    /// The service refused the request as malformed or unsupported.
    #[error("Review service rejected the request (HTTP {status}): {body}")]
    Rejected {
        /// HTTP status code returned.
        status: u16,
        /// Response body, truncated.
        body:   String,
    },
    /// A transient server-side failure.
    #[error("Review service is unavailable (HTTP {status})")]
    Unavailable {
        /// HTTP status code returned.
        status: u16,
    },
    /// The response did not match the expected message shape.
    #[error("Review response violates the protocol: {0}")]
    Protocol(String),
    /// The request body could not be built.
    #[error("Could not encode the review request: {0}")]
    Encode(String),
    /// Every attempt failed with a retriable error.
    #[error("Review gave up after {attempts} attempt(s); last error: {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        last:     Box<ReviewError>,
    },
}

impl ReviewError {
    /// Whether another attempt could reasonably succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ReviewError::Transport(_) | ReviewError::Unavailable { .. } | ReviewError::Protocol(_)
        )
    }
}

/// Per-submission failures that prevent a report from being produced. These
/// never abort the batch; the orchestrator records them next to the reports.
#[derive(Error, Debug)]
pub enum GradingError {
    /// The grading harness itself could not be run (interpreter missing,
    /// spawn failure). This is an infrastructure problem, not a student fault.
    #[error("Could not run the grading harness for `{identity}`: {message}")]
    Harness {
        /// Student whose submission was being graded.
        identity: String,
        /// Description of the failure.
        message:  String,
    },
    /// Results do not line up with the test specification.
    #[error("Inconsistent results for `{identity}`: {message}")]
    Inconsistent {
        /// Student whose report was being assembled.
        identity: String,
        /// Description of the mismatch.
        message:  String,
    },
}
