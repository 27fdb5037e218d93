#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Student reports and the runs that collect them.

/// Merging results and reviews into a final grade.
pub mod aggregate;
/// Where finished runs go.
pub mod sink;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use self::{
    aggregate::{OutcomeCounts, StudentReport, aggregate},
    sink::{JsonReportSink, ReportSink, TableReportSink},
};

/// A submission that could not be graded at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingFailure {
    /// Student identity.
    pub student: String,
    /// Why no report could be produced.
    pub error:   String,
}

/// Everything one invocation of the grader produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingRun {
    /// Unique id of the run.
    run_id:      Uuid,
    /// When grading started.
    started_at:  DateTime<Local>,
    /// When the last submission finished.
    finished_at: DateTime<Local>,
    /// Assignment identifier.
    assignment:  String,
    /// One report per graded submission, in input order.
    reports:     Vec<StudentReport>,
    /// Submissions that produced no report.
    failures:    Vec<GradingFailure>,
}

impl GradingRun {
    /// Assembles a finished run.
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Local>,
        assignment: impl Into<String>,
        reports: Vec<StudentReport>,
        failures: Vec<GradingFailure>,
    ) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: Local::now(),
            assignment: assignment.into(),
            reports,
            failures,
        }
    }

    /// Returns the run id.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns when the run started.
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Returns when the run finished.
    pub fn finished_at(&self) -> DateTime<Local> {
        self.finished_at
    }

    /// Returns the assignment identifier.
    pub fn assignment(&self) -> &str {
        &self.assignment
    }

    /// Returns the reports in input order.
    pub fn reports(&self) -> &[StudentReport] {
        &self.reports
    }

    /// Returns the submissions that could not be graded.
    pub fn failures(&self) -> &[GradingFailure] {
        &self.failures
    }
}
