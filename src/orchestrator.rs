#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Drives submissions through loading, testing, review and aggregation.

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::Local;
use futures::{StreamExt, stream};
use tracing::{Instrument, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::{
    config::GraderConfig,
    error::GradingError,
    grade::{ExecutionContext, Harness, SubmissionLoader, TestRunner, TestSpecification},
    report::{GradingFailure, GradingRun, StudentReport, aggregate},
    review::{ReviewClient, Reviewer},
    submission::Submission,
    util::resolve_python,
};

/// Reports and failures of a batch, each in input order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Submissions that were graded.
    pub reports:  Vec<StudentReport>,
    /// Submissions that could not be graded.
    pub failures: Vec<GradingFailure>,
}

/// Grades submissions against one test specification.
pub struct Grader {
    /// The shared, read-only specification.
    spec:     Arc<TestSpecification>,
    /// Builds execution contexts.
    loader:   SubmissionLoader,
    /// Runs tests against contexts.
    runner:   TestRunner,
    /// Optional qualitative reviewer.
    reviewer: Option<Arc<dyn Reviewer>>,
    /// Run configuration.
    config:   GraderConfig,
}

impl Grader {
    /// Creates a grader, locating the interpreter and building the review
    /// client the configuration asks for.
    pub fn new(spec: TestSpecification, config: GraderConfig) -> Result<Self> {
        let python = resolve_python(config.python().map(PathBuf::as_path))?;
        let harness = Harness::new(python);

        let reviewer = match config.review() {
            Some(settings) => {
                Some(Arc::new(ReviewClient::new(settings.clone())?) as Arc<dyn Reviewer>)
            }
            None => None,
        };

        Ok(Self {
            spec: Arc::new(spec),
            loader: SubmissionLoader::new(harness.clone(), config.load_timeout()),
            runner: TestRunner::new(harness, config.test_timeout()),
            reviewer,
            config,
        })
    }

    /// Replaces the reviewer (or removes it with `None`).
    pub fn with_reviewer(mut self, reviewer: Option<Arc<dyn Reviewer>>) -> Self {
        self.reviewer = reviewer;
        self
    }

    /// Returns the specification being graded against.
    pub fn spec(&self) -> &TestSpecification {
        &self.spec
    }

    /// Returns the run configuration.
    pub fn config(&self) -> &GraderConfig {
        &self.config
    }

    /// Loads a submission without running any test.
    pub async fn probe(&self, submission: &Submission) -> Result<ExecutionContext, GradingError> {
        self.loader
            .load(
                submission.identity(),
                submission.bytes(),
                self.spec.required_functions(),
            )
            .await
    }

    /// Grades one submission end to end.
    ///
    /// A failed review degrades the report to a quantitative-only grade; it
    /// never fails the submission.
    #[instrument(skip_all, fields(student = submission.identity()))]
    pub async fn grade_submission(
        &self,
        submission: &Submission,
    ) -> Result<StudentReport, GradingError> {
        let context = self.probe(submission).await?;
        let results = self
            .runner
            .run_all(&self.spec, &context, self.config.test_concurrency())
            .await?;
        drop(context);

        let review = match &self.reviewer {
            Some(reviewer) => match reviewer
                .review(self.spec.prompt(), submission.source(), &results)
                .await
            {
                Ok(review) => Some(review),
                Err(err) => {
                    warn!("AI review unavailable, grading on test results alone: {err}");
                    None
                }
            },
            None => None,
        };

        aggregate(
            submission.identity(),
            results,
            review,
            &self.spec,
            &self.config,
        )
    }

    /// Grades every submission, `submission_concurrency` at a time. One
    /// submission failing never stops the others.
    pub async fn grade_all(&self, submissions: &[Submission]) -> BatchOutcome {
        let total = submissions.len();

        let graded: Vec<(&str, Result<StudentReport, GradingError>)> =
            stream::iter(submissions.iter().enumerate())
                .map(|(index, submission)| async move {
                    info!("[{}/{}] grading {}", index + 1, total, submission.identity());
                    (submission.identity(), self.grade_submission(submission).await)
                })
                .buffered(self.config.submission_concurrency())
                .collect()
                .await;

        let mut outcome = BatchOutcome::default();
        for (student, result) in graded {
            match result {
                Ok(report) => {
                    info!(
                        "graded {student}: {}/{} passed, grade {:.2}",
                        report.passed(),
                        report.total(),
                        report.final_grade()
                    );
                    outcome.reports.push(report);
                }
                Err(err) => {
                    warn!("could not grade {student}: {err}");
                    outcome.failures.push(GradingFailure {
                        student: student.to_string(),
                        error:   err.to_string(),
                    });
                }
            }
        }
        outcome
    }

    /// Grades every submission as one identified run.
    pub async fn run(&self, submissions: &[Submission]) -> GradingRun {
        let run_id = Uuid::new_v4();
        let started_at = Local::now();
        let span = info_span!("run", %run_id, assignment = self.spec.assignment());

        let outcome = self.grade_all(submissions).instrument(span).await;
        GradingRun::new(
            run_id,
            started_at,
            self.spec.assignment(),
            outcome.reports,
            outcome.failures,
        )
    }
}
