// crates/growthwire-scorer/tests/http_scorer_unit.rs
// ============================================================================
// Module: HTTP Scorer Unit Tests
// Description: Targeted tests for scorer client limits and normalization.
// Purpose: Validate fail-closed behavior against an untrusted scorer.
// ============================================================================

//! ## Overview
//! Unit-level tests for scorer client invariants:
//! - Success replies surface the recommendation
//! - Legacy field spellings are normalized at the edge
//! - Non-success statuses, oversized bodies, malformed JSON, and slow
//!   servers all surface as typed errors

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::thread;
use std::time::Duration;

use growthwire_core::DeviceUid;
use growthwire_core::EnrichmentJob;
use growthwire_core::ReadingId;
use growthwire_core::RecommendationScorer;
use growthwire_core::ScorerError;
use growthwire_scorer::HttpScorer;
use growthwire_scorer::HttpScorerConfig;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn job() -> EnrichmentJob {
    EnrichmentJob {
        record_id: ReadingId::from_raw(7).unwrap(),
        uid: DeviceUid::new("T1"),
        age: 12,
        height: 75.0,
        gender: "female".to_string(),
        status: "normal".to_string(),
    }
}

fn scorer_for(endpoint: String) -> HttpScorer {
    HttpScorer::new(HttpScorerConfig {
        endpoint,
        timeout_ms: 1_000,
        max_response_bytes: 256,
        allow_http: true,
        user_agent: "growthwire-test/0".to_string(),
    })
    .unwrap()
}

/// Serves exactly one request with the given status and body.
fn serve_once(status: u16, body: &'static str) -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let endpoint = format!("http://{addr}/api/recommendation");
    thread::spawn(move || {
        if let Ok(request) = server.recv() {
            let response = Response::from_string(body).with_status_code(status);
            let _ = request.respond(response);
        }
    });
    endpoint
}

// ============================================================================
// SECTION: Success Paths
// ============================================================================

#[tokio::test]
async fn success_reply_surfaces_the_recommendation() {
    let endpoint = serve_once(200, r#"{"recommendation":"continue monitoring"}"#);
    let scorer = scorer_for(endpoint);
    let result = scorer.score(&job()).await.unwrap();
    assert_eq!(result.as_deref(), Some("continue monitoring"));
}

#[tokio::test]
async fn legacy_field_spelling_is_normalized() {
    let endpoint = serve_once(200, r#"{"rekomendasi":"tambah asupan protein"}"#);
    let scorer = scorer_for(endpoint);
    let result = scorer.score(&job()).await.unwrap();
    assert_eq!(result.as_deref(), Some("tambah asupan protein"));
}

#[tokio::test]
async fn absent_recommendation_is_none() {
    let endpoint = serve_once(200, r#"{}"#);
    let scorer = scorer_for(endpoint);
    assert!(scorer.score(&job()).await.unwrap().is_none());
}

#[tokio::test]
async fn empty_recommendation_is_none() {
    let endpoint = serve_once(200, r#"{"recommendation":""}"#);
    let scorer = scorer_for(endpoint);
    assert!(scorer.score(&job()).await.unwrap().is_none());
}

// ============================================================================
// SECTION: Failure Paths
// ============================================================================

#[tokio::test]
async fn non_success_status_is_an_error() {
    let endpoint = serve_once(503, "overloaded");
    let scorer = scorer_for(endpoint);
    let error = scorer.score(&job()).await.unwrap_err();
    assert!(matches!(error, ScorerError::Status(503)));
}

#[tokio::test]
async fn oversized_reply_fails_closed() {
    let endpoint = serve_once(
        200,
        // 300 bytes of filler, over the configured 256-byte cap.
        "{\"recommendation\":\"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\
         aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\
         aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\
         aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\"}",
    );
    let scorer = scorer_for(endpoint);
    let error = scorer.score(&job()).await.unwrap_err();
    assert!(matches!(error, ScorerError::TooLarge { .. }));
}

#[tokio::test]
async fn malformed_reply_is_an_error() {
    let endpoint = serve_once(200, "not json");
    let scorer = scorer_for(endpoint);
    let error = scorer.score(&job()).await.unwrap_err();
    assert!(matches!(error, ScorerError::Malformed(_)));
}

#[tokio::test]
async fn slow_scorer_times_out() {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let endpoint = format!("http://{addr}/api/recommendation");
    thread::spawn(move || {
        if let Ok(request) = server.recv() {
            thread::sleep(Duration::from_millis(3_000));
            let _ = request.respond(Response::from_string("{}"));
        }
    });
    let scorer = scorer_for(endpoint);
    let error = scorer.score(&job()).await.unwrap_err();
    assert!(matches!(error, ScorerError::Timeout));
}

#[tokio::test]
async fn unreachable_scorer_is_a_request_error() {
    // Reserved TEST-NET-1 address; nothing listens there.
    let scorer = scorer_for("http://192.0.2.1:9/api/recommendation".to_string());
    let error = scorer.score(&job()).await.unwrap_err();
    assert!(matches!(error, ScorerError::Request(_) | ScorerError::Timeout));
}

// ============================================================================
// SECTION: Construction Policy
// ============================================================================

#[test]
fn cleartext_endpoint_requires_allow_http() {
    let result = HttpScorer::new(HttpScorerConfig {
        endpoint: "http://scorer.internal/api/recommendation".to_string(),
        allow_http: false,
        ..HttpScorerConfig::default()
    });
    assert!(result.is_err());
}

#[test]
fn invalid_endpoint_is_rejected() {
    let result = HttpScorer::new(HttpScorerConfig {
        endpoint: "not a url".to_string(),
        allow_http: true,
        ..HttpScorerConfig::default()
    });
    assert!(result.is_err());
}
