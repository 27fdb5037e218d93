#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Run configuration, sourced from the environment (and `.env`, which `main`
//! loads through `dotenvy`) or assembled explicitly with the builders.

use std::{path::PathBuf, str::FromStr, time::Duration};

use bon::Builder;
use tracing::warn;

/// Default name of the header carrying the shared secret.
pub const DEFAULT_SECRET_HEADER: &str = "CheckerCredentials";

/// Default per-test time budget in milliseconds.
const DEFAULT_TEST_TIMEOUT_MS: u64 = 2_000;

/// Default budget for loading (probing) a submission, in milliseconds.
const DEFAULT_LOAD_TIMEOUT_MS: u64 = 5_000;

/// Connection details and retry policy for the review service.
#[derive(Debug, Clone, Builder)]
#[builder(on(String, into))]
pub struct ReviewSettings {
    /// Endpoint receiving review requests.
    endpoint:      String,
    /// Pre-shared secret sent with every request.
    secret:        String,
    /// Name of the header carrying the secret.
    #[builder(default = DEFAULT_SECRET_HEADER.to_string())]
    secret_header: String,
    /// Overall timeout for a single attempt.
    #[builder(default = Duration::from_secs(60))]
    timeout:       Duration,
    /// Number of attempts, including the first one.
    #[builder(default = 3)]
    max_attempts:  u32,
    /// Base delay of the exponential backoff between attempts.
    #[builder(default = Duration::from_millis(500))]
    backoff_base:  Duration,
}

impl ReviewSettings {
    /// Returns the review endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the shared secret.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Returns the header name carrying the secret.
    pub fn secret_header(&self) -> &str {
        &self.secret_header
    }

    /// Returns the per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the attempt budget (never less than one).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Returns the backoff base delay.
    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor)
    }

    /// Reads review settings from the environment. Returns `None` unless both
    /// an endpoint and a secret are present.
    pub fn from_env() -> Option<Self> {
        let endpoint = env_string("REVIEW_URL").or_else(|| env_string("WEBHOOK_URL"));
        let secret = env_string("REVIEW_SECRET").or_else(|| env_string("WEBHOOK_SECRET"));

        match (endpoint, secret) {
            (Some(endpoint), Some(secret)) => Some(
                ReviewSettings::builder()
                    .endpoint(endpoint)
                    .secret(secret)
                    .secret_header(
                        env_string("REVIEW_SECRET_HEADER")
                            .unwrap_or_else(|| DEFAULT_SECRET_HEADER.to_string()),
                    )
                    .timeout(Duration::from_secs(env_parse("REVIEW_TIMEOUT_SECS", 60)))
                    .max_attempts(env_parse("REVIEW_MAX_ATTEMPTS", 3))
                    .backoff_base(Duration::from_millis(env_parse("REVIEW_BACKOFF_MS", 500)))
                    .build(),
            ),
            (Some(_), None) => {
                warn!("Review endpoint is set but no secret was provided; AI review disabled");
                None
            }
            (None, Some(_)) => {
                warn!("Review secret is set but no endpoint was provided; AI review disabled");
                None
            }
            (None, None) => None,
        }
    }
}

/// Everything a grading run needs besides the test specification itself.
#[derive(Debug, Clone, Builder)]
pub struct GraderConfig {
    /// Review service settings; `None` disables the AI review.
    review:                 Option<ReviewSettings>,
    /// Interpreter used to run submissions; discovered on `PATH` when unset.
    python:                 Option<PathBuf>,
    /// Default per-test budget, used when a test does not set its own.
    #[builder(default = Duration::from_millis(DEFAULT_TEST_TIMEOUT_MS))]
    test_timeout:           Duration,
    /// Budget for loading a submission and probing its symbols.
    #[builder(default = Duration::from_millis(DEFAULT_LOAD_TIMEOUT_MS))]
    load_timeout:           Duration,
    /// Number of submissions graded at the same time.
    #[builder(default = 4)]
    submission_concurrency: usize,
    /// Number of tests of one submission run at the same time.
    #[builder(default = 1)]
    test_concurrency:       usize,
    /// Largest share of the final grade the AI review may carry.
    #[builder(default = 0.5)]
    review_weight:          f64,
    /// Top of the grading scale.
    #[builder(default = 10.0)]
    grade_scale:            f64,
}

impl Default for GraderConfig {
    fn default() -> Self {
        GraderConfig::builder().build()
    }
}

impl GraderConfig {
    /// Builds a configuration from environment variables, falling back to
    /// defaults for anything missing or unparsable.
    pub fn from_env() -> Self {
        GraderConfig::builder()
            .maybe_review(ReviewSettings::from_env())
            .maybe_python(env_string("GRADER_PYTHON").map(PathBuf::from))
            .test_timeout(Duration::from_millis(env_parse(
                "GRADER_TEST_TIMEOUT_MS",
                DEFAULT_TEST_TIMEOUT_MS,
            )))
            .load_timeout(Duration::from_millis(env_parse(
                "GRADER_LOAD_TIMEOUT_MS",
                DEFAULT_LOAD_TIMEOUT_MS,
            )))
            .submission_concurrency(env_parse("GRADER_CONCURRENCY", 4))
            .test_concurrency(env_parse("GRADER_TEST_CONCURRENCY", 1))
            .review_weight(env_parse("REVIEW_WEIGHT", 0.5))
            .grade_scale(env_parse("GRADE_SCALE", 10.0))
            .build()
    }

    /// Returns the review settings, if the review is enabled.
    pub fn review(&self) -> Option<&ReviewSettings> {
        self.review.as_ref()
    }

    /// Returns a copy of this configuration with the AI review disabled.
    pub fn without_review(mut self) -> Self {
        self.review = None;
        self
    }

    /// Returns a copy of this configuration with a different worker count.
    pub fn with_submission_concurrency(mut self, workers: usize) -> Self {
        self.submission_concurrency = workers;
        self
    }

    /// Returns the configured interpreter override, if any.
    pub fn python(&self) -> Option<&PathBuf> {
        self.python.as_ref()
    }

    /// Returns the default per-test budget.
    pub fn test_timeout(&self) -> Duration {
        self.test_timeout
    }

    /// Returns the module load budget.
    pub fn load_timeout(&self) -> Duration {
        self.load_timeout
    }

    /// Returns the number of submission workers (at least one).
    pub fn submission_concurrency(&self) -> usize {
        self.submission_concurrency.max(1)
    }

    /// Returns the number of concurrent tests per submission (at least one).
    pub fn test_concurrency(&self) -> usize {
        self.test_concurrency.max(1)
    }

    /// Returns the AI weight ceiling, clamped to `[0, 1]`.
    pub fn review_weight(&self) -> f64 {
        if self.review_weight.is_finite() {
            self.review_weight.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Returns the grade scale.
    pub fn grade_scale(&self) -> f64 {
        if self.grade_scale.is_finite() && self.grade_scale > 0.0 {
            self.grade_scale
        } else {
            10.0
        }
    }
}

/// Reads a trimmed, non-empty environment variable.
fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Parses an environment variable, falling back to `default` when it is
/// missing or does not parse.
fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env_string(name)
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let settings = ReviewSettings::builder()
            .endpoint("http://localhost/review")
            .secret("s3cret")
            .backoff_base(Duration::from_millis(100))
            .build();

        assert_eq!(settings.backoff_after(1), Duration::from_millis(100));
        assert_eq!(settings.backoff_after(2), Duration::from_millis(200));
        assert_eq!(settings.backoff_after(3), Duration::from_millis(400));
        assert_eq!(settings.secret_header(), DEFAULT_SECRET_HEADER);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = GraderConfig::builder()
            .review_weight(3.0)
            .grade_scale(-1.0)
            .submission_concurrency(0)
            .build();

        assert_eq!(config.review_weight(), 1.0);
        assert_eq!(config.grade_scale(), 10.0);
        assert_eq!(config.submission_concurrency(), 1);
        assert!(config.review().is_none());
    }
}
