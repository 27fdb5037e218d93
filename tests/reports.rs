//! Tests for final grades, report consistency and report sinks.

use std::path::PathBuf;

use chrono::Local;
use exam_grader::{
    GraderConfig, GradingError, GradingRun, Outcome, TestResult, TestSpecification,
    report::{
        GradingFailure, JsonReportSink, ReportSink, StudentReport, TableReportSink, aggregate,
    },
    review::AiReview,
};
use serde_json::Value;
use uuid::Uuid;

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("exam-grader-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&root).expect("create temp root");
    root
}

fn spec() -> TestSpecification {
    TestSpecification::from_json(
        r#"{
            "assignment": "ejA",
            "prompt": "Write load_matrix",
            "tests": [
                {"name": "a", "function": "load_matrix", "args": [0, 3], "checks": [{"kind": "returns", "value": []}]},
                {"name": "b", "function": "load_matrix", "args": [2, 0], "checks": [{"kind": "returns", "value": []}]},
                {"name": "c", "function": "load_matrix", "args": [1, 1], "inputs": ["x"], "checks": [{"kind": "returns", "value": [["x"]]}]}
            ]
        }"#,
    )
    .expect("valid spec")
}

fn results(outcomes: [Outcome; 3]) -> Vec<TestResult> {
    ["a", "b", "c"]
        .into_iter()
        .zip(outcomes)
        .map(|(name, outcome)| TestResult::new(name, "", outcome, "", 1))
        .collect()
}

fn two_of_three() -> Vec<TestResult> {
    results([Outcome::Passed, Outcome::Passed, Outcome::Timeout])
}

fn report(student: &str, review: Option<AiReview>) -> StudentReport {
    aggregate(student, two_of_three(), review, &spec(), &GraderConfig::default())
        .expect("consistent")
}

#[test]
fn without_a_review_the_grade_is_the_pass_ratio() {
    let report = report("ana", None);

    assert_eq!(report.passed(), 2);
    assert_eq!(report.total(), 3);
    assert_eq!(report.final_grade(), 6.67);
    assert_eq!(report.quantitative_grade(), 6.67);
    assert!(report.quantitative_only());
    assert_eq!(report.review_weight(), 0.0);
}

#[test]
fn zero_confidence_reviews_do_not_move_the_grade() {
    let review = AiReview::new("unsure", 0.0, 0.0, "digest").expect("review");
    let report = report("ana", Some(review));

    assert_eq!(report.final_grade(), 6.67);
    assert!(!report.quantitative_only());
    assert_eq!(report.review_weight(), 0.0);
    assert!(report.review().is_some());
}

#[test]
fn confident_reviews_are_blended_in() {
    let review = AiReview::new("good", 1.0, 9.0, "digest").expect("review");
    let report = aggregate(
        "ana",
        results([Outcome::Passed, Outcome::Error("ValueError".into()), Outcome::Passed]),
        Some(review),
        &spec(),
        &GraderConfig::builder().review_weight(0.3).build(),
    )
    .expect("consistent");

    // 0.7 * 6.666.. + 0.3 * 9
    assert_eq!(report.final_grade(), 7.37);
    assert_eq!(report.review_weight(), 0.3);
}

#[test]
fn grade_scale_is_configurable() {
    let report = aggregate(
        "ana",
        two_of_three(),
        None,
        &spec(),
        &GraderConfig::builder().grade_scale(100.0).build(),
    )
    .expect("consistent");

    assert_eq!(report.final_grade(), 66.67);
}

#[test]
fn results_must_line_up_with_the_specification() {
    let mut short = two_of_three();
    short.pop();
    assert!(matches!(
        aggregate("ana", short, None, &spec(), &GraderConfig::default()),
        Err(GradingError::Inconsistent { ref identity, .. }) if identity == "ana"
    ));

    let mut swapped = two_of_three();
    swapped.swap(0, 1);
    let err = aggregate("ana", swapped, None, &spec(), &GraderConfig::default())
        .expect_err("out of order");
    assert!(err.to_string().contains("result #0 is for `b`"));
}

fn run() -> GradingRun {
    let review = AiReview::new("Revisá count_letters.", 0.5, 8.0, "abc").expect("review");
    GradingRun::new(
        Uuid::new_v4(),
        Local::now(),
        "ejA",
        vec![report("ana_garcia", None), report("bruno_díaz", Some(review))],
        vec![GradingFailure {
            student: "carla_ruiz".into(),
            error:   "Could not run the grading harness".into(),
        }],
    )
}

#[test]
fn json_sink_writes_the_whole_run_once() {
    let root = temp_root();
    let run = run();
    let mut sink = JsonReportSink::new(root.join("informes"));

    sink.persist(&run).expect("persist");

    let written = sink.last_written().expect("path").to_path_buf();
    let name = written.file_name().and_then(|n| n.to_str()).expect("name");
    assert!(name.starts_with("results_") && name.ends_with(".json"), "{name}");
    assert_eq!(std::fs::read_dir(root.join("informes")).expect("dir").count(), 1);

    let raw = std::fs::read_to_string(&written).expect("read");
    assert!(raw.contains("bruno_díaz"), "non-ASCII text is kept as is");
    let document: Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(document["run_id"], run.run_id().to_string());
    assert_eq!(document["reports"].as_array().map(Vec::len), Some(2));
    assert_eq!(document["reports"][1]["review"]["narrative_report"], "Revisá count_letters.");
    assert_eq!(document["reports"][0]["results"][2]["outcome"]["kind"], "TIMEOUT");
    assert_eq!(document["failures"][0]["student"], "carla_ruiz");

    let back: GradingRun = serde_json::from_str(&raw).expect("read back");
    assert_eq!(back.reports()[1].student(), "bruno_díaz");

    std::fs::remove_dir_all(root).ok();
}

#[test]
fn table_lists_every_student() {
    let table = TableReportSink::render(&run());

    assert!(table.contains("Grading overview: ejA"));
    assert!(table.contains("ana_garcia"));
    assert!(table.contains("2/3"));
    assert!(table.contains("0.50"));
    assert!(table.contains("2 graded"));
}
