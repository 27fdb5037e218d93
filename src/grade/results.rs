#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Per-test outcomes.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Outcome of running one test against one submission. Exactly one applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Every check held.
    Passed,
    /// The call completed but at least one check did not hold.
    Failed(String),
    /// The submission does not define the target function.
    MissingFunction(String),
    /// The call (or loading the module) raised.
    Error(String),
    /// The call exceeded its time budget and was killed.
    Timeout,
}

impl Outcome {
    /// Wire/report label of the outcome kind.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "PASSED",
            Outcome::Failed(_) => "FAILED",
            Outcome::MissingFunction(_) => "MISSING_FUNCTION",
            Outcome::Error(_) => "ERROR",
            Outcome::Timeout => "TIMEOUT",
        }
    }

    /// Reason, missing name or error summary, when the kind carries one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Outcome::Failed(detail) | Outcome::MissingFunction(detail) | Outcome::Error(detail) => {
                Some(detail)
            }
            Outcome::Passed | Outcome::Timeout => None,
        }
    }

    /// Whether this is [`Outcome::Passed`].
    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}({})", self.label(), detail),
            None => write!(f, "{}", self.label()),
        }
    }
}

/// Result of one (submission, test) pair. Produced exactly once and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Name of the test this result belongs to.
    test:            String,
    /// Test description, carried for the reviewer and the report.
    description:     String,
    /// What happened.
    outcome:         Outcome,
    /// Text the function printed while it ran.
    captured_output: String,
    /// Wall-clock time spent on the test, in milliseconds.
    duration_ms:     u64,
}

impl TestResult {
    /// Creates a result.
    pub fn new(
        test: impl Into<String>,
        description: impl Into<String>,
        outcome: Outcome,
        captured_output: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            test: test.into(),
            description: description.into(),
            outcome,
            captured_output: captured_output.into(),
            duration_ms,
        }
    }

    /// Returns the test name.
    pub fn test(&self) -> &str {
        &self.test
    }

    /// Returns the test description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the outcome.
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Returns the captured output.
    pub fn captured_output(&self) -> &str {
        &self.captured_output
    }

    /// Returns the time spent, in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}
