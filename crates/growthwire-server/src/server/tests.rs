// crates/growthwire-server/src/server/tests.rs
// ============================================================================
// Module: Server Handler Tests
// Description: Response-contract tests for the ingestion and read handlers.
// Purpose: Validate status mapping against the pipeline contract.
// ============================================================================

//! ## Overview
//! Handler-level tests for the response contract:
//! - 400 for malformed or oversized bodies
//! - 403 for integrity failures, with the store unchanged
//! - 404 for plaintext submissions naming unknown devices
//! - 201 for accepted envelopes, including uninterpretable ones
//! - Read responses carry only visible readings

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

use aes::Aes128;
use aes::cipher::BlockEncryptMut;
use aes::cipher::KeyIvInit;
use aes::cipher::block_padding::NoPadding;
use growthwire_core::DeviceRecord;
use growthwire_core::EnvelopeKeys;
use growthwire_core::envelope::codec::hex_encode;
use growthwire_core::envelope::codec::pkcs7_pad;
use growthwire_core::envelope::verifier::compute_tag;

use super::*;
use crate::audit::NoopAuditSink;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// AES-128-CBC encryptor used to build test envelopes.
type Aes128CbcEnc = cbc::Encryptor<Aes128>;

const AES_KEY: [u8; 16] = [0x11; 16];
const AES_IV: [u8; 16] = [0x22; 16];
const HMAC_KEY: &[u8] = b"fleet-hmac-key";

struct Fixture {
    state: Arc<AppState>,
    store: Arc<InMemoryReadingStore>,
    registry: Arc<InMemoryDeviceRegistry>,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryReadingStore::new());
    let registry = Arc::new(InMemoryDeviceRegistry::new());
    let keys = EnvelopeKeys::new(AES_KEY, AES_IV, HMAC_KEY.to_vec());
    let (queue, _reconciler) = Reconciler::new(
        Arc::new(NeverScorer),
        Arc::clone(&store) as Arc<dyn ReadingStore>,
        Arc::new(NoopAuditSink),
        ReconcilerConfig {
            max_attempts: 1,
            retry_backoff: std::time::Duration::from_millis(1),
        },
        4,
    );
    let pipeline = IngestPipeline::new(
        Arc::clone(&store) as Arc<dyn ReadingStore>,
        Arc::clone(&registry) as Arc<dyn DeviceRegistry>,
        Arc::new(queue),
        keys,
    );
    Fixture {
        state: Arc::new(AppState {
            pipeline,
            audit: Arc::new(NoopAuditSink),
            metrics: Arc::new(NoopMetrics),
            max_body_bytes: 4 * 1024,
        }),
        store,
        registry,
    }
}

/// Scorer stub; handler tests never drive the worker.
struct NeverScorer;

#[async_trait::async_trait]
impl growthwire_core::RecommendationScorer for NeverScorer {
    async fn score(
        &self,
        _job: &growthwire_core::EnrichmentJob,
    ) -> Result<Option<String>, growthwire_core::ScorerError> {
        Ok(None)
    }
}

fn envelope_json(plaintext: &str) -> String {
    let mut buffer = pkcs7_pad(plaintext.as_bytes());
    let length = buffer.len();
    let encryptor = Aes128CbcEnc::new_from_slices(&AES_KEY, &AES_IV).unwrap();
    encryptor.encrypt_padded_mut::<NoPadding>(&mut buffer, length).unwrap();
    let payload = hex_encode(&buffer);
    let hmac = hex_encode(&compute_tag(payload.as_bytes(), HMAC_KEY));
    serde_json::to_string(&json!({ "payload": payload, "hmac": hmac })).unwrap()
}

fn ingest(fixture: &Fixture, body: &str) -> (StatusCode, Value, IngestOutcomeLabel) {
    ingest_response(&fixture.state, &Bytes::from(body.to_string()))
}

// ============================================================================
// SECTION: Rejections
// ============================================================================

#[test]
fn malformed_body_is_bad_request() {
    let fixture = fixture();
    let (status, body, _) = ingest(&fixture, "not json");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("malformed"));
}

#[test]
fn oversized_body_is_bad_request() {
    let fixture = fixture();
    let huge = format!(r#"{{"payload":"{}","hmac":"00"}}"#, "a".repeat(8 * 1024));
    let (status, _, _) = ingest(&fixture, &huge);
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[test]
fn tampered_envelope_is_forbidden_and_store_unchanged() {
    let fixture = fixture();
    let body = envelope_json(r#"{"uid":"T1","age":12,"height":75.0,"status":"normal"}"#)
        .replace("\"hmac\":\"", "\"hmac\":\"00");
    let (status, body, _) = ingest(&fixture, &body);
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("integrity"));
    assert!(fixture.store.is_empty().unwrap());
}

#[test]
fn plain_unknown_device_is_not_found() {
    let fixture = fixture();
    let (status, _, _) =
        ingest(&fixture, r#"{"uid":"ghost","age":12,"height":75.0,"status":"normal"}"#);
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(fixture.store.is_empty().unwrap());
}

// ============================================================================
// SECTION: Acceptance
// ============================================================================

#[test]
fn valid_envelope_is_created() {
    let fixture = fixture();
    let body = envelope_json(r#"{"uid":"T1","age":12,"height":75.0,"status":"normal"}"#);
    let (status, body, label) = ingest(&fixture, &body);
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "status accepted");
    assert_eq!(label, IngestOutcomeLabel::Accepted);
    assert_eq!(fixture.store.len().unwrap(), 1);
}

#[test]
fn uninterpretable_envelope_is_still_created() {
    let fixture = fixture();
    let body = envelope_json("garbage interior");
    let (status, _, _) = ingest(&fixture, &body);
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(fixture.store.len().unwrap(), 1);
}

#[test]
fn plain_submission_for_registered_device_is_created() {
    let fixture = fixture();
    fixture
        .registry
        .register(DeviceRecord {
            uid: DeviceUid::new("T1"),
            name: "subject-one".to_string(),
            gender: "female".to_string(),
        })
        .unwrap();
    let (status, _, _) =
        ingest(&fixture, r#"{"uid":"T1","age":12,"height":75.0,"status":"normal"}"#);
    assert_eq!(status, StatusCode::CREATED);
}

// ============================================================================
// SECTION: Read Path
// ============================================================================

#[test]
fn list_carries_only_visible_readings() {
    let fixture = fixture();
    let body = envelope_json(r#"{"uid":"T1","age":12,"height":75.0,"status":"normal"}"#);
    ingest(&fixture, &body);
    let corrupt = envelope_json("garbage interior");
    ingest(&fixture, &corrupt);

    let (status, body) = list_response(&fixture.state, None);
    assert_eq!(status, StatusCode::OK);
    let readings = body.0.as_array().unwrap().clone();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0]["uid"], "T1");
}

#[test]
fn device_filter_excludes_other_devices() {
    let fixture = fixture();
    ingest(&fixture, &envelope_json(r#"{"uid":"T1","age":12,"height":75.0,"status":"normal"}"#));
    ingest(&fixture, &envelope_json(r#"{"uid":"T2","age":9,"height":70.0,"status":"normal"}"#));

    let (status, body) = list_response(&fixture.state, Some(DeviceUid::new("T2")));
    assert_eq!(status, StatusCode::OK);
    let readings = body.0.as_array().unwrap().clone();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0]["uid"], "T2");
}

#[tokio::test]
async fn health_probe_is_ok() {
    let response = handle_health().await.into_response();
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// SECTION: Mapping Table
// ============================================================================

#[test]
fn rejection_mapping_matches_the_contract() {
    let (status, _, kind, _) = rejection(&IngestError::Integrity);
    assert_eq!((status, kind), (StatusCode::FORBIDDEN, "integrity"));
    let (status, _, kind, _) = rejection(&IngestError::Malformed("x".to_string()));
    assert_eq!((status, kind), (StatusCode::BAD_REQUEST, "malformed"));
    let (status, _, kind, _) = rejection(&IngestError::UnknownDevice("x".to_string()));
    assert_eq!((status, kind), (StatusCode::NOT_FOUND, "unknown_device"));
    let (status, _, kind, _) = rejection(&IngestError::Storage("x".to_string()));
    assert_eq!((status, kind), (StatusCode::INTERNAL_SERVER_ERROR, "storage"));
}
