//! Tests for loading and validating test specifications.

use std::{path::PathBuf, time::Duration};

use exam_grader::{
    SpecError, TestSpecification,
    grade::{Check, TestCase},
};
use serde_json::json;

fn assignment(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("assignments")
        .join(format!("{name}.json"))
}

#[test]
fn fixture_specs_load_in_declaration_order() {
    let spec = TestSpecification::load(&assignment("ejA")).expect("load ejA");

    assert_eq!(spec.assignment(), "ejA");
    assert_eq!(spec.len(), 11);
    assert_eq!(spec.tests()[0].name(), "test_load_matrix_invalid_row");
    assert_eq!(spec.tests()[10].name(), "test_print_matrix_row_count");
    assert_eq!(
        spec.required_functions(),
        ["load_matrix", "print_matrix", "count_letters", "main"]
    );
    assert_eq!(spec.timeout_or(Duration::from_secs(9)), Duration::from_millis(2000));
}

#[test]
fn required_functions_default_to_targets_in_order() {
    let spec = TestSpecification::load(&assignment("ejB")).expect("load ejB");

    assert_eq!(
        spec.required_functions(),
        [
            "load_matrix",
            "show_palindrome",
            "show_longest_word",
            "show_duplicated_words",
            "menu"
        ]
    );
    assert_eq!(spec.timeout_or(Duration::from_secs(9)), Duration::from_secs(9));
}

#[test]
fn duplicate_test_names_are_rejected() {
    let raw = json!({
        "assignment": "dup",
        "tests": [
            {"name": "t", "function": "f", "checks": [{"kind": "returns", "value": 1}]},
            {"name": "t", "function": "g", "checks": [{"kind": "returns", "value": 2}]}
        ]
    })
    .to_string();

    match TestSpecification::from_json(&raw) {
        Err(SpecError::DuplicateTest(name)) => assert_eq!(name, "t"),
        other => panic!("expected a duplicate test error, got {other:?}"),
    }
}

#[test]
fn argument_index_must_exist() {
    let raw = json!({
        "assignment": "idx",
        "tests": [{
            "name": "mutates",
            "function": "count_letters",
            "args": ["vowel"],
            "checks": [{"kind": "argument_equals", "index": 1, "value": []}]
        }]
    })
    .to_string();

    let err = TestSpecification::from_json(&raw).expect_err("index 1 is out of range");
    assert!(matches!(err, SpecError::InvalidTest { ref test, .. } if test == "mutates"));
}

#[test]
fn unlisted_target_functions_are_rejected() {
    let raw = json!({
        "assignment": "req",
        "required_functions": ["f"],
        "tests": [{"name": "t", "function": "g", "checks": [{"kind": "output_equals", "text": ""}]}]
    })
    .to_string();

    assert!(matches!(
        TestSpecification::from_json(&raw),
        Err(SpecError::InvalidTest { .. })
    ));
}

#[test]
fn empty_specs_and_bad_files_are_errors() {
    assert!(matches!(
        TestSpecification::from_json(r#"{"assignment": "none", "tests": []}"#),
        Err(SpecError::Empty)
    ));
    assert!(matches!(
        TestSpecification::load(&assignment("does-not-exist")),
        Err(SpecError::Read { .. })
    ));
    assert!(matches!(
        TestSpecification::from_json("{not json"),
        Err(SpecError::Parse { .. })
    ));
}

#[test]
fn tests_without_checks_are_rejected() {
    let test = TestCase::builder()
        .name("nothing")
        .function("f")
        .checks(Vec::<Check>::new())
        .build();

    assert!(matches!(
        TestSpecification::new("x", "", vec![test]),
        Err(SpecError::InvalidTest { .. })
    ));
}
