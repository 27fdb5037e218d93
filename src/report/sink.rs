#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Destinations for finished grading runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, Width, object::Rows},
};
use tracing::info;

use super::{GradingRun, StudentReport};

/// Somewhere a finished run can be persisted to.
pub trait ReportSink {
    /// Persists the whole run. A run is either persisted completely or not
    /// at all.
    fn persist(&mut self, run: &GradingRun) -> Result<()>;
}

/// Writes each run to `<out_dir>/results_<YYYYmmdd_HHMMSS>.json`.
#[derive(Debug, Clone)]
pub struct JsonReportSink {
    /// Directory the documents are written to.
    out_dir:      PathBuf,
    /// Path of the most recently written document.
    last_written: Option<PathBuf>,
}

impl JsonReportSink {
    /// Creates a sink writing into `out_dir`, which is created on demand.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir:      out_dir.into(),
            last_written: None,
        }
    }

    /// Returns the output directory.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Returns the path of the last document written, if any.
    pub fn last_written(&self) -> Option<&Path> {
        self.last_written.as_deref()
    }
}

impl ReportSink for JsonReportSink {
    fn persist(&mut self, run: &GradingRun) -> Result<()> {
        let document =
            serde_json::to_vec_pretty(run).context("Could not serialize the grading run")?;

        std::fs::create_dir_all(&self.out_dir).with_context(|| {
            format!("Could not create output directory {}", self.out_dir.display())
        })?;
        let path = self.out_dir.join(format!(
            "results_{}.json",
            run.started_at().format("%Y%m%d_%H%M%S")
        ));
        std::fs::write(&path, document)
            .with_context(|| format!("Could not write {}", path.display()))?;

        info!(path = %path.display(), reports = run.reports().len(), "Results written");
        self.last_written = Some(path);
        Ok(())
    }
}

/// One row of the terminal summary.
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Student")]
    /// Student identity.
    student:    String,
    #[tabled(rename = "Passed")]
    /// `passed/total`.
    passed:     String,
    #[tabled(rename = "Failed")]
    /// `FAILED` count.
    failed:     usize,
    #[tabled(rename = "Missing")]
    /// `MISSING_FUNCTION` count.
    missing:    usize,
    #[tabled(rename = "Error")]
    /// `ERROR` count.
    error:      usize,
    #[tabled(rename = "Timeout")]
    /// `TIMEOUT` count.
    timeout:    usize,
    #[tabled(rename = "AI confidence")]
    /// Review confidence, or `-`.
    confidence: String,
    #[tabled(rename = "Grade")]
    /// Final grade.
    grade:      String,
    #[tabled(rename = "Basis")]
    /// Whether the review contributed.
    basis:      String,
}

impl From<&StudentReport> for SummaryRow {
    fn from(report: &StudentReport) -> Self {
        let counts = report.counts();
        Self {
            student:    report.student().to_string(),
            passed:     format!("{}/{}", report.passed(), report.total()),
            failed:     counts.failed,
            missing:    counts.missing,
            error:      counts.error,
            timeout:    counts.timeout,
            confidence: report
                .review()
                .map(|review| format!("{:.2}", review.confidence()))
                .unwrap_or_else(|| "-".to_string()),
            grade:      format!("{:.2}", report.final_grade()),
            basis:      if report.quantitative_only() {
                "tests only".to_string()
            } else {
                "tests + review".to_string()
            },
        }
    }
}

/// Prints a summary table of the run to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableReportSink;

impl TableReportSink {
    /// Renders the summary table without printing it.
    pub fn render(run: &GradingRun) -> String {
        let rows: Vec<SummaryRow> = run.reports().iter().map(SummaryRow::from).collect();
        Table::new(&rows)
            .with(Panel::header(format!("Grading overview: {}", run.assignment())))
            .with(Panel::footer(format!(
                "{} graded, {} failed to grade",
                run.reports().len(),
                run.failures().len()
            )))
            .with(Modify::new(Rows::new(1..)).with(Width::wrap(24).keep_words(true)))
            .with(
                Modify::new(Rows::first())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(
                Modify::new(Rows::last())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(Style::modern())
            .to_string()
    }
}

impl ReportSink for TableReportSink {
    fn persist(&mut self, run: &GradingRun) -> Result<()> {
        println!("{}", format!("Run {}", run.run_id()).dimmed());
        println!("{}", Self::render(run));

        for failure in run.failures() {
            println!(
                "{} {}: {}",
                "could not grade".red().bold(),
                failure.student.yellow(),
                failure.error
            );
        }
        Ok(())
    }
}
