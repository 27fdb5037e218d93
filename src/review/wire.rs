#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Message shapes exchanged with the review service.

use serde::{Deserialize, Serialize};

use crate::{error::ReviewError, grade::TestResult};

/// One test result as the review service sees it.
#[derive(Debug, Clone, Serialize)]
pub struct WireTestResult<'a> {
    /// Test name.
    pub name:            &'a str,
    /// Test description.
    pub description:     &'a str,
    /// `PASSED`, `FAILED`, `MISSING_FUNCTION`, `ERROR` or `TIMEOUT`.
    pub outcome:         &'static str,
    /// Failure reason, missing name or error summary.
    pub detail:          Option<&'a str>,
    /// Output the test printed.
    pub captured_output: &'a str,
}

impl<'a> From<&'a TestResult> for WireTestResult<'a> {
    fn from(result: &'a TestResult) -> Self {
        Self {
            name:            result.test(),
            description:     result.description(),
            outcome:         result.outcome().label(),
            detail:          result.outcome().detail(),
            captured_output: result.captured_output(),
        }
    }
}

/// Body of a review request.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewRequest<'a> {
    /// Prompt of the assignment being graded.
    pub assignment_prompt: &'a str,
    /// Full submission source.
    pub source_text:       &'a str,
    /// Results of every test, in specification order.
    pub test_results:      Vec<WireTestResult<'a>>,
}

impl<'a> ReviewRequest<'a> {
    /// Assembles a request from a submission and its results.
    pub fn new(assignment_prompt: &'a str, source_text: &'a str, results: &'a [TestResult]) -> Self {
        Self {
            assignment_prompt,
            source_text,
            test_results: results.iter().map(WireTestResult::from).collect(),
        }
    }
}

/// Body of a review response. Every field is optional on the wire so that a
/// missing field is reported by name instead of as a generic decode error.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewResponse {
    /// Free-text assessment.
    pub narrative_report: Option<String>,
    /// Reviewer's confidence in `[0, 1]`.
    pub confidence:       Option<f64>,
    /// Reviewer's proposed grade.
    pub suggested_grade:  Option<f64>,
}

/// A validated review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiReview {
    /// Free-text assessment.
    narrative_report:    String,
    /// Confidence in `[0, 1]`.
    confidence:          f64,
    /// Proposed grade, on the reviewer's own terms.
    suggested_grade:     f64,
    /// Lowercase hex SHA-256 of the raw response body.
    raw_response_digest: String,
}

impl AiReview {
    /// Creates a review, rejecting values outside the protocol's ranges.
    pub fn new(
        narrative_report: impl Into<String>,
        confidence: f64,
        suggested_grade: f64,
        raw_response_digest: impl Into<String>,
    ) -> Result<Self, ReviewError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ReviewError::Protocol(format!(
                "`confidence` must be within [0, 1], got {confidence}"
            )));
        }
        if !suggested_grade.is_finite() {
            return Err(ReviewError::Protocol(format!(
                "`suggested_grade` must be a finite number, got {suggested_grade}"
            )));
        }

        Ok(Self {
            narrative_report: narrative_report.into(),
            confidence,
            suggested_grade,
            raw_response_digest: raw_response_digest.into(),
        })
    }

    /// Returns the narrative.
    pub fn narrative_report(&self) -> &str {
        &self.narrative_report
    }

    /// Returns the confidence.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Returns the suggested grade.
    pub fn suggested_grade(&self) -> f64 {
        self.suggested_grade
    }

    /// Returns the digest of the response the review was read from.
    pub fn raw_response_digest(&self) -> &str {
        &self.raw_response_digest
    }
}

impl ReviewResponse {
    /// Checks that every field is present and in range.
    pub fn into_review(self, digest: String) -> Result<AiReview, ReviewError> {
        let missing = |field: &str| ReviewError::Protocol(format!("response is missing `{field}`"));

        let narrative = self
            .narrative_report
            .ok_or_else(|| missing("narrative_report"))?;
        let confidence = self.confidence.ok_or_else(|| missing("confidence"))?;
        let suggested = self
            .suggested_grade
            .ok_or_else(|| missing("suggested_grade"))?;

        AiReview::new(narrative, confidence, suggested, digest)
    }
}
