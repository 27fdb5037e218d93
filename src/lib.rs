//! # exam-grader
//!
//! Grades a batch of Python exam submissions against a declarative test
//! specification. Every test runs in a fresh interpreter under a time budget,
//! so a crash, hang or missing function in one submission only affects that
//! submission's own results. Results can optionally be sent to an external
//! review service, whose confidence-weighted grade is merged with the
//! pass-ratio grade into one report per student.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Run configuration
pub mod config;
/// Error types
pub mod error;
/// Loading submissions and running tests against them
pub mod grade;
/// Grading many submissions as one run
pub mod orchestrator;
/// Bounded, killable child processes
pub mod process;
/// Student reports, final grades and report sinks
pub mod report;
/// The external review service
pub mod review;
/// Student submissions
pub mod submission;
/// Utility functions for convenience
pub mod util;

pub use config::{GraderConfig, ReviewSettings};
pub use error::{GradingError, ReviewError, SpecError};
pub use grade::{Outcome, TestResult, TestSpecification};
pub use orchestrator::{BatchOutcome, Grader};
pub use report::{GradingRun, StudentReport};
pub use submission::{Submission, discover_submissions};
