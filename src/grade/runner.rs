#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Runs test cases against a loaded submission, containing every fault to the
//! test that caused it.

use std::time::{Duration, Instant};

use futures::{StreamExt, stream};
use tracing::{debug, warn};

use super::{
    checks::{self, Observed},
    harness::{Harness, HarnessRun, MODULE_NAME, Reply, Request},
    loader::ExecutionContext,
    results::{Outcome, TestResult},
    suite::{TestCase, TestSpecification},
};
use crate::error::GradingError;

/// Executes test cases in fresh interpreter processes under a time budget.
#[derive(Debug, Clone)]
pub struct TestRunner {
    /// Interpreter driver.
    harness:        Harness,
    /// Budget for tests that do not set their own.
    default_budget: Duration,
}

impl TestRunner {
    /// Creates a runner whose tests default to `default_budget`.
    pub fn new(harness: Harness, default_budget: Duration) -> Self {
        Self {
            harness,
            default_budget,
        }
    }

    /// Returns a runner that uses `budget` for tests without their own.
    pub fn with_default_budget(mut self, budget: Duration) -> Self {
        self.default_budget = budget;
        self
    }

    /// Runs one test case against a context and classifies what happened.
    ///
    /// The only error is an interpreter that cannot be started; every fault of
    /// the submission itself becomes the test's outcome.
    pub async fn run(
        &self,
        test: &TestCase,
        context: &ExecutionContext,
    ) -> Result<TestResult, GradingError> {
        let result = |outcome: Outcome, output: String, elapsed: Duration| {
            TestResult::new(
                test.name(),
                test.description(),
                outcome,
                output,
                elapsed.as_millis() as u64,
            )
        };

        if let Some(fault) = context.fault() {
            return Ok(result(Outcome::Error(fault.to_string()), String::new(), Duration::ZERO));
        }
        if context.is_missing(test.function()) {
            return Ok(result(
                Outcome::MissingFunction(test.function().to_string()),
                String::new(),
                Duration::ZERO,
            ));
        }

        // The budget covers the call; start-up and the module body are replayed
        // first and get the time they took while loading.
        let budget = test.timeout_or(self.default_budget);
        let request = Request::Call {
            module:   MODULE_NAME,
            source:   context.source(),
            function: test.function(),
            args:     test.args(),
            inputs:   test.inputs(),
        };

        let started = Instant::now();
        let run = self
            .harness
            .execute(&request, budget + context.load_time())
            .await
            .map_err(|err| GradingError::Harness {
                identity: context.identity().to_string(),
                message:  format!("{err:#}"),
            })?;

        let graded = match run {
            HarnessRun::TimedOut { .. } => {
                warn!(
                    student = context.identity(),
                    test = test.name(),
                    budget_ms = budget.as_millis() as u64,
                    "Test timed out"
                );
                result(Outcome::Timeout, String::new(), budget)
            }
            HarnessRun::NoReply {
                status,
                stderr,
                duration,
            } => result(
                Outcome::Error(format!(
                    "harness exited without a result ({status}){}",
                    if stderr.is_empty() {
                        String::new()
                    } else {
                        format!(": {stderr}")
                    }
                )),
                String::new(),
                duration,
            ),
            HarnessRun::Replied { reply, duration } => match reply {
                Reply::Returned {
                    value,
                    args,
                    output,
                } => {
                    let observed = Observed {
                        value:  &value,
                        args:   &args,
                        output: &output,
                    };
                    let failures = checks::evaluate(test.checks(), &observed);
                    let outcome = if failures.is_empty() {
                        Outcome::Passed
                    } else {
                        Outcome::Failed(failures.join("\n"))
                    };
                    result(outcome, output, duration)
                }
                Reply::Raised { error, output } => result(Outcome::Error(error), output, duration),
                Reply::Missing => result(
                    Outcome::MissingFunction(test.function().to_string()),
                    String::new(),
                    duration,
                ),
                Reply::LoadError { error } => result(Outcome::Error(error), String::new(), duration),
                Reply::Loaded { .. } => result(
                    Outcome::Error("harness answered a call with a probe result".to_string()),
                    String::new(),
                    duration,
                ),
            },
        };

        debug!(
            student = context.identity(),
            test = test.name(),
            outcome = graded.outcome().label(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ran test"
        );
        Ok(graded)
    }

    /// Runs every test of the specification against one context, at most
    /// `concurrency` at a time. Results come back in declaration order no
    /// matter which invocation finishes first.
    pub async fn run_all(
        &self,
        spec: &TestSpecification,
        context: &ExecutionContext,
        concurrency: usize,
    ) -> Result<Vec<TestResult>, GradingError> {
        let runner = self
            .clone()
            .with_default_budget(spec.timeout_or(self.default_budget));
        let runner = &runner;

        stream::iter(spec.tests())
            .map(|test| runner.run(test, context))
            .buffered(concurrency.max(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect()
    }
}
