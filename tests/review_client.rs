//! Tests for the review client against a local stand-in service.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use exam_grader::{
    Outcome, ReviewError, ReviewSettings, TestResult,
    review::{ReviewClient, Reviewer, digest},
};
use serde_json::Value;

/// Canned responses, served in order; the last one repeats.
#[derive(Clone)]
struct Script {
    responses: Arc<Vec<(u16, String)>>,
    hits:      Arc<AtomicUsize>,
    seen:      Arc<Mutex<Vec<(Option<String>, Value)>>>,
    delay:     Duration,
}

impl Script {
    fn new(responses: Vec<(u16, String)>) -> Self {
        Self {
            responses: Arc::new(responses),
            hits:      Arc::new(AtomicUsize::new(0)),
            seen:      Arc::new(Mutex::new(Vec::new())),
            delay:     Duration::ZERO,
        }
    }

    /// Holds every response back by `delay`.
    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn respond(State(script): State<Script>, headers: HeaderMap, body: Bytes) -> (StatusCode, String) {
    let hit = script.hits.fetch_add(1, Ordering::SeqCst);
    let secret = headers
        .get("CheckerCredentials")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let request = serde_json::from_slice(&body).unwrap_or(Value::Null);
    script.seen.lock().expect("lock").push((secret, request));
    tokio::time::sleep(script.delay).await;

    let (status, body) = &script.responses[hit.min(script.responses.len() - 1)];
    (StatusCode::from_u16(*status).expect("status"), body.clone())
}

async fn serve(script: Script) -> String {
    let app = Router::new()
        .route("/review", post(respond))
        .with_state(script);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}/review")
}

fn client(endpoint: String, attempts: u32) -> ReviewClient {
    client_with_timeout(endpoint, attempts, Duration::from_secs(5))
}

fn client_with_timeout(endpoint: String, attempts: u32, timeout: Duration) -> ReviewClient {
    let settings = ReviewSettings::builder()
        .endpoint(endpoint)
        .secret("s3cret")
        .timeout(timeout)
        .max_attempts(attempts)
        .backoff_base(Duration::from_millis(10))
        .build();
    ReviewClient::new(settings).expect("client")
}

fn results() -> Vec<TestResult> {
    vec![
        TestResult::new("test_load_matrix_valid", "loads", Outcome::Passed, "", 4),
        TestResult::new(
            "test_count_letters_vowels",
            "counts",
            Outcome::Failed("Argument 1 differs".into()),
            "",
            5,
        ),
    ]
}

const GOOD: &str = r#"{"narrative_report": "Solid work.", "confidence": 0.8, "suggested_grade": 7.5}"#;

#[tokio::test]
async fn successful_review_is_decoded_and_digested() {
    let script = Script::new(vec![(200, GOOD.to_string())]);
    let client = client(serve(script.clone()).await, 3);

    let review = client
        .review("Write load_matrix", "def load_matrix(r, c): ...", &results())
        .await
        .expect("review");

    assert_eq!(review.narrative_report(), "Solid work.");
    assert_eq!(review.confidence(), 0.8);
    assert_eq!(review.suggested_grade(), 7.5);
    assert_eq!(review.raw_response_digest(), digest(GOOD.as_bytes()));
    assert_eq!(script.hits(), 1);

    let seen = script.seen.lock().expect("lock");
    let (secret, request) = &seen[0];
    assert_eq!(secret.as_deref(), Some("s3cret"));
    assert_eq!(request["assignment_prompt"], "Write load_matrix");
    assert_eq!(request["test_results"][1]["outcome"], "FAILED");
    assert_eq!(request["test_results"][1]["detail"], "Argument 1 differs");
}

#[tokio::test]
async fn bad_credentials_are_not_retried() {
    let script = Script::new(vec![(401, String::new())]);
    let client = client(serve(script.clone()).await, 3);

    let err = client
        .review("prompt", "source", &results())
        .await
        .expect_err("unauthorized");

    assert!(matches!(err, ReviewError::Unauthorized { status: 401 }));
    assert_eq!(script.hits(), 1);
}

#[tokio::test]
async fn rejected_requests_are_not_retried() {
    let script = Script::new(vec![(422, "bad payload".to_string())]);
    let client = client(serve(script.clone()).await, 3);

    let err = client
        .review("prompt", "source", &results())
        .await
        .expect_err("rejected");

    assert!(matches!(err, ReviewError::Rejected { status: 422, ref body } if body == "bad payload"));
    assert_eq!(script.hits(), 1);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let script = Script::new(vec![(503, String::new()), (200, GOOD.to_string())]);
    let client = client(serve(script.clone()).await, 3);

    let review = client
        .review("prompt", "source", &results())
        .await
        .expect("second attempt succeeds");

    assert_eq!(review.confidence(), 0.8);
    assert_eq!(script.hits(), 2);
}

#[tokio::test]
async fn incomplete_responses_exhaust_the_attempts() {
    let script = Script::new(vec![(
        200,
        r#"{"narrative_report": "ok", "suggested_grade": 9}"#.to_string(),
    )]);
    let client = client(serve(script.clone()).await, 3);

    let err = client
        .review("prompt", "source", &results())
        .await
        .expect_err("never complete");

    match err {
        ReviewError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, ReviewError::Protocol(ref msg) if msg.contains("confidence")));
        }
        other => panic!("expected exhaustion, got {other}"),
    }
    assert_eq!(script.hits(), 3);
}

#[tokio::test]
async fn unreachable_service_is_a_transport_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let client = client(format!("http://{addr}/review"), 2);

    let err = client
        .review("prompt", "source", &results())
        .await
        .expect_err("nothing listens");

    assert!(matches!(
        err,
        ReviewError::Exhausted { attempts: 2, ref last } if matches!(**last, ReviewError::Transport(_))
    ));
}

#[tokio::test]
async fn slow_service_times_out_and_is_retried() {
    let script = Script::new(vec![(200, GOOD.to_string())]).delayed(Duration::from_millis(800));
    let client = client_with_timeout(serve(script.clone()).await, 2, Duration::from_millis(100));

    let err = client
        .review("prompt", "source", &results())
        .await
        .expect_err("every attempt times out");

    assert!(matches!(
        err,
        ReviewError::Exhausted { attempts: 2, ref last } if matches!(**last, ReviewError::Transport(_))
    ));
    assert_eq!(script.hits(), 2);
}
