#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The declarative test specification for one assignment.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SpecError;

/// A single assertion about one invocation of the function under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Check {
    /// The return value equals `value`.
    Returns {
        /// Expected return value.
        value: Value,
    },
    /// After the call, positional argument `index` equals `value`.
    ArgumentEquals {
        /// Zero-based position of the argument.
        index: usize,
        /// Expected value of the argument after the call.
        value: Value,
    },
    /// Captured stdout equals `text` exactly.
    OutputEquals {
        /// Expected output.
        text: String,
    },
    /// Captured stdout contains every fragment.
    OutputContains {
        /// Fragments that must all appear.
        fragments: Vec<String>,
    },
    /// Captured stdout has exactly `lines` non-blank lines.
    OutputLineCount {
        /// Expected number of non-blank lines.
        lines: usize,
    },
}

/// One test case: which function to call, with what, and what must hold
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(on(String, into))]
pub struct TestCase {
    /// Unique name within the specification.
    name:        String,
    /// Function the submission must define.
    function:    String,
    /// Free text shown to the reviewer and in reports.
    #[serde(default)]
    #[builder(default)]
    description: String,
    /// Positional arguments, decoded afresh for every invocation.
    #[serde(default)]
    #[builder(default)]
    args:        Vec<Value>,
    /// Scripted responses for `input()`, consumed in order.
    #[serde(default)]
    #[builder(default)]
    inputs:      Vec<String>,
    /// Per-test override of the time budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_ms:  Option<u64>,
    /// Assertions that must all hold for the test to pass.
    #[builder(with = |checks: impl IntoIterator<Item = Check>| checks.into_iter().collect())]
    checks:      Vec<Check>,
}

impl TestCase {
    /// Returns the test name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the function under test.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Returns the human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the positional arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Returns the scripted `input()` responses.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Returns the assertions.
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Returns this test's time budget, or `default` when it sets none.
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_ms.map(Duration::from_millis).unwrap_or(default)
    }

    /// Checks the test for internal consistency.
    fn validate(&self) -> Result<(), SpecError> {
        let invalid = |reason: String| SpecError::InvalidTest {
            test: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("the test name is empty".into()));
        }
        if self.function.trim().is_empty() {
            return Err(invalid("no target function is named".into()));
        }
        if self.checks.is_empty() {
            return Err(invalid("it declares no checks".into()));
        }
        if self.timeout_ms == Some(0) {
            return Err(invalid("`timeout_ms` must be positive".into()));
        }
        for check in &self.checks {
            if let Check::ArgumentEquals { index, .. } = check {
                if *index >= self.args.len() {
                    return Err(invalid(format!(
                        "`argument_equals` refers to argument {index} but only {} argument(s) \
                         are passed",
                        self.args.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The fixed, ordered set of tests for one assignment. Immutable once loaded
/// and shared read-only by every submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpecification {
    /// Short assignment identifier.
    assignment:         String,
    /// Assignment text forwarded to the reviewer.
    #[serde(default)]
    prompt:             String,
    /// Functions every submission must define.
    #[serde(default)]
    required_functions: Vec<String>,
    /// Default per-test budget for this assignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_ms:         Option<u64>,
    /// Tests in declaration order.
    tests:              Vec<TestCase>,
}

impl TestSpecification {
    /// Assembles and validates a specification in memory.
    pub fn new(
        assignment: impl Into<String>,
        prompt: impl Into<String>,
        tests: Vec<TestCase>,
    ) -> Result<Self, SpecError> {
        let spec = Self {
            assignment: assignment.into(),
            prompt: prompt.into(),
            required_functions: Vec::new(),
            timeout_ms: None,
            tests,
        };
        spec.validated()
    }

    /// Reads and validates a specification from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SpecError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SpecError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|err| match err {
            SpecError::Parse { source, .. } => SpecError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parses and validates a specification from JSON text.
    pub fn from_json(raw: &str) -> Result<Self, SpecError> {
        let spec: TestSpecification =
            serde_json::from_str(raw).map_err(|source| SpecError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        spec.validated()
    }

    /// Fills in derived fields and checks every invariant.
    fn validated(mut self) -> Result<Self, SpecError> {
        if self.tests.is_empty() {
            return Err(SpecError::Empty);
        }

        let mut seen = HashSet::new();
        for test in &self.tests {
            test.validate()?;
            if !seen.insert(test.name.as_str()) {
                return Err(SpecError::DuplicateTest(test.name.clone()));
            }
        }

        if self.required_functions.is_empty() {
            for test in &self.tests {
                if !self.required_functions.contains(&test.function) {
                    self.required_functions.push(test.function.clone());
                }
            }
        } else if let Some(test) = self
            .tests
            .iter()
            .find(|test| !self.required_functions.contains(&test.function))
        {
            return Err(SpecError::InvalidTest {
                test:   test.name.clone(),
                reason: format!(
                    "targets `{}`, which is not listed in `required_functions`",
                    test.function
                ),
            });
        }

        Ok(self)
    }

    /// Returns the assignment identifier.
    pub fn assignment(&self) -> &str {
        &self.assignment
    }

    /// Returns the assignment prompt.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Returns the functions every submission must define.
    pub fn required_functions(&self) -> &[String] {
        &self.required_functions
    }

    /// Returns the tests in declaration order.
    pub fn tests(&self) -> &[TestCase] {
        &self.tests
    }

    /// Returns the number of tests.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Always false for a validated specification.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Returns the assignment-wide budget, or `default` when it sets none.
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_ms.map(Duration::from_millis).unwrap_or(default)
    }
}
