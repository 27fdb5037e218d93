#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Evaluation of declarative checks against what a call produced.

use itertools::Itertools;
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

use super::suite::Check;

/// What a completed call left behind: its return value, the arguments as they
/// look after the call, and everything it printed.
#[derive(Debug, Clone, PartialEq)]
pub struct Observed<'a> {
    /// Value returned by the function.
    pub value:  &'a Value,
    /// Positional arguments after the call.
    pub args:   &'a [Value],
    /// Captured stdout.
    pub output: &'a str,
}

/// Runs every check and returns the failure reason of each one that does not
/// hold. An empty vector means the test passed.
pub fn evaluate(checks: &[Check], observed: &Observed<'_>) -> Vec<String> {
    checks
        .iter()
        .filter_map(|check| evaluate_one(check, observed))
        .collect()
}

/// Evaluates a single check, returning a reason when it fails.
fn evaluate_one(check: &Check, observed: &Observed<'_>) -> Option<String> {
    match check {
        Check::Returns { value } => (!values_match(value, observed.value)).then(|| {
            format!(
                "Return value differs from the expected one.\n{}",
                value_diff(value, observed.value)
            )
        }),
        Check::ArgumentEquals { index, value } => match observed.args.get(*index) {
            Some(actual) if values_match(value, actual) => None,
            Some(actual) => Some(format!(
                "Argument {index} after the call differs from the expected one.\n{}",
                value_diff(value, actual)
            )),
            None => Some(format!("Argument {index} was not available after the call.")),
        },
        Check::OutputEquals { text } => (text != observed.output).then(|| {
            format!(
                "Printed output differs from the expected one.\n{}",
                format_diff(text, observed.output)
            )
        }),
        Check::OutputContains { fragments } => {
            let missing: Vec<&str> = fragments
                .iter()
                .map(String::as_str)
                .filter(|fragment| !observed.output.contains(fragment))
                .collect();
            (!missing.is_empty()).then(|| {
                format!(
                    "Printed output is missing {}.\nOutput was:\n{}",
                    missing
                        .iter()
                        .map(|fragment| format!("{fragment:?}"))
                        .join(", "),
                    quote_block(observed.output)
                )
            })
        }
        Check::OutputLineCount { lines } => {
            let actual = observed
                .output
                .lines()
                .filter(|line| !line.trim().is_empty())
                .count();
            (actual != *lines).then(|| {
                format!(
                    "Expected {lines} non-blank line(s) of output, got {actual}.\nOutput was:\n{}",
                    quote_block(observed.output)
                )
            })
        }
    }
}

/// Structural equality where numbers compare by value, so `3` matches `3.0`,
/// and booleans equal `1`/`0` as they do in Python.
pub fn values_match(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => a == b,
            },
        },
        // Python's `bool` is an `int`: `True == 1` and `False == 0.0`.
        (Value::Bool(flag), Value::Number(n)) | (Value::Number(n), Value::Bool(flag)) => {
            n.as_f64() == Some(if *flag { 1.0 } else { 0.0 })
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| values_match(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| values_match(value, other)))
        }
        _ => expected == actual,
    }
}

/// Line diff of two values rendered as pretty JSON.
fn value_diff(expected: &Value, actual: &Value) -> String {
    let expected = serde_json::to_string_pretty(expected).unwrap_or_else(|_| expected.to_string());
    let actual = serde_json::to_string_pretty(actual).unwrap_or_else(|_| actual.to_string());
    format_diff(&expected, &actual)
}

/// Formats a diff between expected and actual text, `-` marking expected
/// lines and `+` marking actual ones.
pub fn format_diff(expected: &str, actual: &str) -> String {
    let diff = TextDiff::from_lines(expected, actual);
    let mut output = String::from("--- expected\n+++ actual\n");

    for change in diff.iter_all_changes() {
        let prefix = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        output.push_str(prefix);
        output.push(' ');
        output.push_str(change.value());
        if change.missing_newline() {
            output.push('\n');
        }
    }

    output
}

/// Indents text so it reads as a quoted block inside a reason.
fn quote_block(text: &str) -> String {
    if text.is_empty() {
        return "    <nothing>".to_string();
    }
    text.lines().map(|line| format!("    {line}")).join("\n")
}
