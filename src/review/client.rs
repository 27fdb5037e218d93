#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! HTTP client for the review service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    Client, StatusCode,
    header::{CONTENT_TYPE, HeaderName, HeaderValue},
};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::wire::{AiReview, ReviewRequest, ReviewResponse};
use crate::{config::ReviewSettings, error::ReviewError, grade::TestResult, util::truncate};

/// Longest response body excerpt kept in a [`ReviewError::Rejected`].
const REJECTED_BODY_LIMIT: usize = 512;

/// Produces a qualitative review of a graded submission.
#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Reviews one submission given its source and test results.
    async fn review(
        &self,
        assignment_prompt: &str,
        source_text: &str,
        results: &[TestResult],
    ) -> Result<AiReview, ReviewError>;
}

/// Talks to the review service over HTTP, retrying transient failures with
/// exponential backoff.
#[derive(Debug, Clone)]
pub struct ReviewClient {
    /// Shared HTTP client; carries the per-attempt timeout.
    http:          Client,
    /// Endpoint, retry policy and credentials.
    settings:      ReviewSettings,
    /// Parsed name of the credentials header.
    secret_header: HeaderName,
    /// Parsed credentials header value.
    secret:        HeaderValue,
}

impl ReviewClient {
    /// Builds a client from review settings.
    pub fn new(settings: ReviewSettings) -> Result<Self> {
        let http = Client::builder()
            .no_proxy()
            .timeout(settings.timeout())
            .build()
            .context("Failed to construct review HTTP client")?;
        let secret_header = HeaderName::from_bytes(settings.secret_header().as_bytes())
            .with_context(|| format!("`{}` is not a valid header name", settings.secret_header()))?;
        let mut secret = HeaderValue::from_str(settings.secret())
            .context("Review secret is not a valid header value")?;
        secret.set_sensitive(true);

        Ok(Self {
            http,
            settings,
            secret_header,
            secret,
        })
    }

    /// Returns the settings the client was built with.
    pub fn settings(&self) -> &ReviewSettings {
        &self.settings
    }

    /// Sends the encoded request once and classifies the answer.
    async fn attempt(&self, body: &[u8]) -> Result<AiReview, ReviewError> {
        let response = self
            .http
            .post(self.settings.endpoint())
            .header(CONTENT_TYPE, "application/json")
            .header(self.secret_header.clone(), self.secret.clone())
            .body(body.to_vec())
            .send()
            .await
            .map_err(|err| ReviewError::Transport(err.to_string()))?;

        let status = response.status();
        let raw = response
            .bytes()
            .await
            .map_err(|err| ReviewError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status, &raw));
        }

        let digest = digest(&raw);
        let decoded: ReviewResponse = serde_json::from_slice(&raw)
            .map_err(|err| ReviewError::Protocol(format!("response is not valid JSON: {err}")))?;
        decoded.into_review(digest)
    }
}

#[async_trait]
impl Reviewer for ReviewClient {
    async fn review(
        &self,
        assignment_prompt: &str,
        source_text: &str,
        results: &[TestResult],
    ) -> Result<AiReview, ReviewError> {
        let request = ReviewRequest::new(assignment_prompt, source_text, results);
        let body =
            serde_json::to_vec(&request).map_err(|err| ReviewError::Encode(err.to_string()))?;
        let attempts = self.settings.max_attempts();

        let mut attempt = 1;
        loop {
            match self.attempt(&body).await {
                Ok(review) => {
                    debug!(attempt, confidence = review.confidence(), "Review received");
                    return Ok(review);
                }
                Err(err) if err.is_retriable() => {
                    if attempt >= attempts {
                        return Err(ReviewError::Exhausted {
                            attempts,
                            last: Box::new(err),
                        });
                    }
                    let delay = self.settings.backoff_after(attempt);
                    warn!(
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        "Review attempt failed: {err}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Maps a non-success status to the matching error class.
fn classify_status(status: StatusCode, body: &[u8]) -> ReviewError {
    let code = status.as_u16();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ReviewError::Unauthorized { status: code }
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            ReviewError::Unavailable { status: code }
        }
        _ if status.is_server_error() => ReviewError::Unavailable { status: code },
        _ => ReviewError::Rejected {
            status: code,
            body:   truncate(&String::from_utf8_lossy(body), REJECTED_BODY_LIMIT),
        },
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_error_classes() {
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, b""),
            ReviewError::Unauthorized { status: 403 }
        ));
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, b"").is_retriable());
        assert!(classify_status(StatusCode::BAD_GATEWAY, b"").is_retriable());
        assert!(!classify_status(StatusCode::UNPROCESSABLE_ENTITY, b"nope").is_retriable());
    }

    #[test]
    fn digest_is_lowercase_sha256_hex() {
        assert_eq!(
            digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn invalid_header_names_are_rejected_up_front() {
        let settings = ReviewSettings::builder()
            .endpoint("http://127.0.0.1:9/review")
            .secret("s3cret")
            .secret_header("not a header")
            .build();
        assert!(ReviewClient::new(settings).is_err());
    }
}
