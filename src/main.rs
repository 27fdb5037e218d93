#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # grader
//!
//! Command line front end of `exam-grader`.
//!
//! Review service credentials are read from the environment or a `.env` file
//! (`REVIEW_URL` and `REVIEW_SECRET`, or the older `WEBHOOK_URL` and
//! `WEBHOOK_SECRET`). Without them every grade is computed from test results
//! alone.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use bpaf::*;
use colored::Colorize;
use dotenvy::dotenv;
use exam_grader::{
    GraderConfig, TestSpecification,
    grade::SymbolState,
    orchestrator::Grader,
    report::{JsonReportSink, ReportSink, TableReportSink},
    submission::{Submission, discover_submissions},
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, util::SubscriberInitExt};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Grade every submission in a directory
    Grade {
        /// Test specification file
        tests:       PathBuf,
        /// Directory of `*.py` submissions
        submissions: PathBuf,
        /// Directory results are written to
        out:         PathBuf,
        /// Skip the AI review
        no_review:   bool,
        /// Submission worker override
        concurrency: Option<usize>,
    },
    /// Load one submission and show which functions it defines
    Probe {
        /// Test specification file
        tests: PathBuf,
        /// Submission to load
        file:  PathBuf,
    },
    /// Validate a test specification
    Check(PathBuf),
}

/// Builds the command line parser
fn options() -> OptionParser<Cmd> {
    /// parses the test specification path
    fn spec_path() -> impl Parser<PathBuf> {
        long("tests")
            .short('t')
            .help("Path to the assignment's test specification (JSON)")
            .argument::<PathBuf>("SPEC")
    }

    let submissions = long("submissions")
        .short('s')
        .help("Directory holding one .py file per student")
        .argument::<PathBuf>("DIR");
    let out = long("out")
        .short('o')
        .help("Directory the results JSON is written to")
        .argument::<PathBuf>("DIR")
        .fallback(PathBuf::from("informes"))
        .debug_fallback();
    let no_review = long("no-review")
        .help("Grade on test results alone, even when a review service is configured")
        .switch();
    let concurrency = long("concurrency")
        .short('j')
        .help("Number of submissions graded at the same time")
        .argument::<usize>("N")
        .optional();
    let tests = spec_path();
    let grade = construct!(Cmd::Grade {
        tests,
        submissions,
        out,
        no_review,
        concurrency
    })
    .to_options()
    .command("grade")
    .help("Grade every submission in a directory");

    let file = positional::<PathBuf>("FILE").help("Submission to load");
    let tests = spec_path();
    let probe = construct!(Cmd::Probe { tests, file })
        .to_options()
        .command("probe")
        .help("Load one submission and list the required functions it defines");

    let spec = positional::<PathBuf>("SPEC").help("Test specification to validate");
    let check = construct!(Cmd::Check(spec))
        .to_options()
        .command("check")
        .help("Validate a test specification");

    let cmd = construct!([grade, probe, check]);

    cmd.to_options().descr("Grades Python exam submissions")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let cmd = options().run();

    match cmd {
        Cmd::Grade {
            tests,
            submissions,
            out,
            no_review,
            concurrency,
        } => {
            let spec = TestSpecification::load(&tests)?;
            let mut config = GraderConfig::from_env();
            if no_review {
                config = config.without_review();
            } else if config.review().is_none() {
                warn!("No review service configured; grades are computed from test results alone");
            }
            if let Some(workers) = concurrency {
                config = config.with_submission_concurrency(workers);
            }

            let submissions = discover_submissions(&submissions)?;
            if submissions.is_empty() {
                bail!("No submissions found");
            }
            info!(
                "Found {} submission(s) for {}",
                submissions.len(),
                spec.assignment()
            );

            let grader = Grader::new(spec, config)?;
            let run = grader.run(&submissions).await;

            TableReportSink.persist(&run)?;
            let mut json = JsonReportSink::new(out);
            json.persist(&run).context("Failed to save results")?;
            if let Some(path) = json.last_written() {
                println!("Results saved to {}", path.display().to_string().bold());
            }
        }
        Cmd::Probe { tests, file } => {
            let spec = TestSpecification::load(&tests)?;
            let submission = Submission::from_path(&file)?;
            let grader = Grader::new(spec, GraderConfig::from_env().without_review())?;
            let context = grader.probe(&submission).await?;

            if let Some(fault) = context.fault() {
                println!("{} {fault}", "load fault:".red().bold());
            }
            for (name, state) in context.symbols() {
                match state {
                    SymbolState::Present => println!("{} {name}", "present".green()),
                    SymbolState::Missing => println!("{} {name}", "missing".red()),
                }
            }
            if !context.load_output().is_empty() {
                println!("{}\n{}", "output while loading:".dimmed(), context.load_output());
            }
        }
        Cmd::Check(path) => {
            let spec = TestSpecification::load(&path)?;
            println!(
                "{} {}: {} test(s) over {}",
                "ok".green().bold(),
                spec.assignment(),
                spec.len(),
                spec.required_functions().join(", ")
            );
        }
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_is_well_formed() {
        options().check_invariants(false);
    }

    #[test]
    fn grade_writes_to_informes_by_default() {
        let cmd = options()
            .run_inner(&["grade", "--tests", "ejA.json", "-s", "entregas"])
            .expect("parse");
        match cmd {
            Cmd::Grade {
                tests,
                submissions,
                out,
                no_review,
                concurrency,
            } => {
                assert_eq!(tests, PathBuf::from("ejA.json"));
                assert_eq!(submissions, PathBuf::from("entregas"));
                assert_eq!(out, PathBuf::from("informes"));
                assert!(!no_review);
                assert_eq!(concurrency, None);
            }
            other => panic!("expected grade, got {other:?}"),
        }
    }

    #[test]
    fn grade_flags_override_defaults() {
        let cmd = options()
            .run_inner(&[
                "grade", "-t", "ejA.json", "-s", "entregas", "-o", "out", "--no-review", "-j", "2",
            ])
            .expect("parse");
        assert!(matches!(
            cmd,
            Cmd::Grade { out, no_review: true, concurrency: Some(2), .. } if out == PathBuf::from("out")
        ));
    }

    #[test]
    fn probe_and_check_take_positional_paths() {
        let probe = options()
            .run_inner(&["probe", "--tests", "ejA.json", "ana.py"])
            .expect("parse");
        assert!(matches!(probe, Cmd::Probe { file, .. } if file == PathBuf::from("ana.py")));

        let check = options().run_inner(&["check", "ejB.json"]).expect("parse");
        assert!(matches!(check, Cmd::Check(path) if path == PathBuf::from("ejB.json")));
    }
}
