#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Merges test results and the optional AI review into one report.

use serde::{Deserialize, Serialize};

use crate::{
    config::GraderConfig,
    error::GradingError,
    grade::{Outcome, TestResult, TestSpecification},
    review::AiReview,
};

/// How many results ended in each outcome kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    /// `PASSED` results.
    pub passed:  usize,
    /// `FAILED` results.
    pub failed:  usize,
    /// `MISSING_FUNCTION` results.
    pub missing: usize,
    /// `ERROR` results.
    pub error:   usize,
    /// `TIMEOUT` results.
    pub timeout: usize,
}

impl OutcomeCounts {
    /// Tallies a list of results.
    pub fn tally(results: &[TestResult]) -> Self {
        results
            .iter()
            .fold(Self::default(), |mut counts, result| {
                match result.outcome() {
                    Outcome::Passed => counts.passed += 1,
                    Outcome::Failed(_) => counts.failed += 1,
                    Outcome::MissingFunction(_) => counts.missing += 1,
                    Outcome::Error(_) => counts.error += 1,
                    Outcome::Timeout => counts.timeout += 1,
                }
                counts
            })
    }
}

/// The final, per-student artifact of a grading run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentReport {
    /// Student identity.
    student:            String,
    /// One result per test, in specification order.
    results:            Vec<TestResult>,
    /// Per-kind outcome counts.
    counts:             OutcomeCounts,
    /// Number of tests.
    total:              usize,
    /// `passed / total`, or 0 for an empty suite.
    pass_ratio:         f64,
    /// `pass_ratio` projected on the grade scale.
    quantitative_grade: f64,
    /// The AI review, when one was obtained.
    review:             Option<AiReview>,
    /// Weight the AI grade carried in `final_grade`.
    review_weight:      f64,
    /// Final grade, rounded to two decimals.
    final_grade:        f64,
    /// Whether the grade was computed without a review.
    quantitative_only:  bool,
}

impl StudentReport {
    /// Returns the student identity.
    pub fn student(&self) -> &str {
        &self.student
    }

    /// Returns the results in specification order.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Returns the outcome counts.
    pub fn counts(&self) -> OutcomeCounts {
        self.counts
    }

    /// Returns the number of passing tests.
    pub fn passed(&self) -> usize {
        self.counts.passed
    }

    /// Returns the number of tests.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns the pass ratio.
    pub fn pass_ratio(&self) -> f64 {
        self.pass_ratio
    }

    /// Returns the grade computed from test results alone.
    pub fn quantitative_grade(&self) -> f64 {
        self.quantitative_grade
    }

    /// Returns the review, if any.
    pub fn review(&self) -> Option<&AiReview> {
        self.review.as_ref()
    }

    /// Returns the effective AI weight.
    pub fn review_weight(&self) -> f64 {
        self.review_weight
    }

    /// Returns the final grade.
    pub fn final_grade(&self) -> f64 {
        self.final_grade
    }

    /// Whether no review contributed to the grade.
    pub fn quantitative_only(&self) -> bool {
        self.quantitative_only
    }
}

/// Builds a student's report.
///
/// Results must line up one-to-one, by name and position, with the tests of
/// `spec`. The AI grade is clamped to the grade scale and weighted by
/// `review_weight * confidence`; without a review the grade is purely
/// quantitative.
pub fn aggregate(
    identity: &str,
    results: Vec<TestResult>,
    review: Option<AiReview>,
    spec: &TestSpecification,
    config: &GraderConfig,
) -> Result<StudentReport, GradingError> {
    let inconsistent = |message: String| GradingError::Inconsistent {
        identity: identity.to_string(),
        message,
    };

    if results.len() != spec.len() {
        return Err(inconsistent(format!(
            "expected {} results, got {}",
            spec.len(),
            results.len()
        )));
    }
    if let Some((position, (result, test))) = results
        .iter()
        .zip(spec.tests())
        .enumerate()
        .find(|(_, (result, test))| result.test() != test.name())
    {
        return Err(inconsistent(format!(
            "result #{position} is for `{}` but the test at that position is `{}`",
            result.test(),
            test.name()
        )));
    }

    let counts = OutcomeCounts::tally(&results);
    let total = results.len();
    let pass_ratio = if total == 0 {
        0.0
    } else {
        counts.passed as f64 / total as f64
    };

    let scale = config.grade_scale();
    let quantitative_grade = pass_ratio * scale;
    let (final_grade, review_weight) = match &review {
        Some(review) => {
            let weight = config.review_weight() * review.confidence();
            let ai_grade = review.suggested_grade().clamp(0.0, scale);
            ((1.0 - weight) * quantitative_grade + weight * ai_grade, weight)
        }
        None => (quantitative_grade, 0.0),
    };

    Ok(StudentReport {
        student: identity.to_string(),
        quantitative_only: review.is_none(),
        results,
        counts,
        total,
        pass_ratio,
        quantitative_grade: round2(quantitative_grade),
        review,
        review_weight,
        final_grade: round2(final_grade),
    })
}

/// Rounds to two decimals.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grade::{Check, TestCase};

    fn spec(names: &[&str]) -> TestSpecification {
        let tests = names
            .iter()
            .map(|name| {
                TestCase::builder()
                    .name(*name)
                    .function("f")
                    .checks([Check::OutputLineCount { lines: 0 }])
                    .build()
            })
            .collect();
        TestSpecification::new("ej", "prompt", tests).expect("valid spec")
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        assert_eq!(round2(6.666_666), 6.67);
        assert_eq!(round2(10.0), 10.0);
    }

    #[test]
    fn counts_every_kind() {
        let results = vec![
            TestResult::new("a", "", Outcome::Passed, "", 0),
            TestResult::new("b", "", Outcome::Timeout, "", 0),
            TestResult::new("c", "", Outcome::Error("ValueError".into()), "", 0),
        ];
        let counts = OutcomeCounts::tally(&results);
        assert_eq!(counts.passed, 1);
        assert_eq!(counts.timeout, 1);
        assert_eq!(counts.error, 1);
        assert_eq!(counts.failed + counts.missing, 0);
    }

    #[test]
    fn out_of_range_suggestions_are_clamped() {
        let spec = spec(&["a", "b"]);
        let results = vec![
            TestResult::new("a", "", Outcome::Passed, "", 0),
            TestResult::new("b", "", Outcome::Passed, "", 0),
        ];
        let review = AiReview::new("great", 1.0, 42.0, "digest").expect("valid review");
        let report = aggregate("ana", results, Some(review), &spec, &GraderConfig::default())
            .expect("consistent");

        assert_eq!(report.final_grade(), 10.0);
        assert_eq!(report.review_weight(), 0.5);
    }
}
