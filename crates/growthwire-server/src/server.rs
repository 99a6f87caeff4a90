// crates/growthwire-server/src/server.rs
// ============================================================================
// Module: Growthwire HTTP Server
// Description: HTTP binding for ingestion and read endpoints.
// Purpose: Expose the ingestion pipeline to field devices over HTTP.
// Dependencies: growthwire-core, growthwire-config, axum, tokio
// ============================================================================

//! ## Overview
//! The server wires the configuration into concrete backends, spawns the
//! enrichment reconciler, and serves the device-facing endpoints: envelope
//! ingestion, the visible-reading list, a per-device list, and a liveness
//! probe. Status mapping follows the pipeline contract: acceptance even on
//! partial interpretation failure, integrity rejection before persistence,
//! storage failure as a generic server error. Security posture: request
//! bodies come from untrusted field devices and are size-capped before
//! parsing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use growthwire_core::DeviceRegistry;
use growthwire_core::DeviceUid;
use growthwire_core::EnrichmentDisposition;
use growthwire_core::IngestBody;
use growthwire_core::IngestError;
use growthwire_core::IngestOutcome;
use growthwire_core::IngestPipeline;
use growthwire_core::InMemoryDeviceRegistry;
use growthwire_core::InMemoryReadingStore;
use growthwire_core::Interpretation;
use growthwire_core::ReadingStore;
use growthwire_core::Timestamp;
use growthwire_core::visible_readings;
use growthwire_scorer::HttpScorer;
use growthwire_scorer::HttpScorerConfig;
use growthwire_store_sqlite::SqliteReadingStore;
use growthwire_store_sqlite::SqliteStoreConfig;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::audit::AuditSink;
use crate::audit::FileAuditSink;
use crate::audit::IngestAuditEvent;
use crate::audit::StderrAuditSink;
use crate::audit::now_millis;
use crate::config::GrowthwireConfig;
use crate::config::StoreType;
use crate::reconciler::Reconciler;
use crate::reconciler::ReconcilerConfig;
use crate::telemetry::IngestMetrics;
use crate::telemetry::IngestOutcomeLabel;
use crate::telemetry::NoopMetrics;

#[cfg(test)]
mod tests;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server lifecycle errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration is invalid.
    #[error("config error: {0}")]
    Config(String),
    /// A backend could not be initialized.
    #[error("init error: {0}")]
    Init(String),
    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Growthwire server instance.
pub struct GrowthwireServer {
    /// Validated bind address.
    bind: SocketAddr,
    /// Shared handler state.
    state: Arc<AppState>,
    /// Enrichment worker, spawned by [`GrowthwireServer::serve`].
    reconciler: Reconciler,
}

/// Shared state behind the HTTP handlers.
struct AppState {
    /// Ingestion pipeline.
    pipeline: IngestPipeline,
    /// Audit sink for request events.
    audit: Arc<dyn AuditSink>,
    /// Metrics sink for request counters and latencies.
    metrics: Arc<dyn IngestMetrics>,
    /// Maximum accepted request body size.
    max_body_bytes: usize,
}

impl GrowthwireServer {
    /// Builds a server from configuration.
    ///
    /// Key material resolves exactly once here; the pipeline holds it
    /// immutably for the process lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when validation or backend initialization
    /// fails.
    pub fn from_config(config: &GrowthwireConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let bind = config
            .server
            .bind
            .parse::<SocketAddr>()
            .map_err(|_| ServerError::Config("invalid bind address".to_string()))?;
        let keys = config.keys.resolve().map_err(|err| ServerError::Config(err.to_string()))?;
        let (store, registry) = build_store(config)?;
        let scorer = HttpScorer::new(HttpScorerConfig {
            endpoint: config.scorer.endpoint.clone(),
            timeout_ms: config.scorer.timeout_ms,
            max_response_bytes: config.scorer.max_response_bytes,
            allow_http: config.scorer.allow_http,
            user_agent: config.scorer.user_agent.clone(),
        })
        .map_err(|err| ServerError::Init(err.to_string()))?;
        let audit = build_audit(config)?;
        let (queue, reconciler) = Reconciler::new(
            Arc::new(scorer),
            Arc::clone(&store),
            Arc::clone(&audit),
            ReconcilerConfig {
                max_attempts: config.enrichment.max_attempts,
                retry_backoff: std::time::Duration::from_millis(config.enrichment.retry_backoff_ms),
            },
            config.enrichment.queue_capacity,
        );
        let pipeline = IngestPipeline::new(store, registry, Arc::new(queue), keys);
        Ok(Self {
            bind,
            state: Arc::new(AppState {
                pipeline,
                audit,
                metrics: Arc::new(NoopMetrics),
                max_body_bytes: config.server.max_body_bytes,
            }),
            reconciler,
        })
    }

    /// Serves requests until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let _worker = self.reconciler.spawn();
        let app = router(self.state);
        let listener = tokio::net::TcpListener::bind(self.bind)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()))
    }
}

/// Builds the HTTP router over the shared state.
fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", post(handle_ingest).get(handle_list))
        .route("/api/devices/{uid}/status", get(handle_device_list))
        .route("/healthz", get(handle_health))
        .with_state(state)
}

/// Builds the store and registry backends from configuration.
fn build_store(
    config: &GrowthwireConfig,
) -> Result<(Arc<dyn ReadingStore>, Arc<dyn DeviceRegistry>), ServerError> {
    match config.store.store_type {
        StoreType::Memory => Ok((
            Arc::new(InMemoryReadingStore::new()),
            Arc::new(InMemoryDeviceRegistry::new()),
        )),
        StoreType::Sqlite => {
            let path = config
                .store
                .path
                .clone()
                .ok_or_else(|| ServerError::Config("sqlite store requires path".to_string()))?;
            let store = SqliteReadingStore::new(SqliteStoreConfig {
                path,
                busy_timeout_ms: config.store.busy_timeout_ms,
                journal_mode: config.store.journal_mode,
                sync_mode: config.store.sync_mode,
            })
            .map_err(|err| ServerError::Init(err.to_string()))?;
            let registry = store.device_registry();
            Ok((Arc::new(store), Arc::new(registry)))
        }
    }
}

/// Builds the audit sink from configuration.
fn build_audit(config: &GrowthwireConfig) -> Result<Arc<dyn AuditSink>, ServerError> {
    match &config.server.audit_log {
        Some(path) => {
            let sink = FileAuditSink::new(path)
                .map_err(|err| ServerError::Init(format!("audit log open failed: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handles `POST /api/status`: device submissions across protocol versions.
async fn handle_ingest(
    State(state): State<Arc<AppState>>,
    bytes: Bytes,
) -> impl IntoResponse {
    let started = Instant::now();
    let response = ingest_response(&state, &bytes);
    state.metrics.record_ingest(response.2);
    state.metrics.record_latency(response.2, started.elapsed());
    (response.0, axum::Json(response.1))
}

/// Computes the ingest response and audits the outcome.
fn ingest_response(
    state: &AppState,
    bytes: &Bytes,
) -> (StatusCode, Value, IngestOutcomeLabel) {
    if bytes.len() > state.max_body_bytes {
        audit_rejection(state, "oversized");
        return (
            StatusCode::BAD_REQUEST,
            json!({ "error": "request body too large" }),
            IngestOutcomeLabel::Malformed,
        );
    }
    let Ok(body) = serde_json::from_slice::<IngestBody>(bytes) else {
        audit_rejection(state, "malformed");
        return (
            StatusCode::BAD_REQUEST,
            json!({ "error": "malformed request body" }),
            IngestOutcomeLabel::Malformed,
        );
    };
    match state.pipeline.ingest(&body, now_timestamp()) {
        Ok(outcome) => {
            audit_acceptance(state, &outcome);
            (
                StatusCode::CREATED,
                json!({ "message": "status accepted" }),
                IngestOutcomeLabel::Accepted,
            )
        }
        Err(error) => {
            let (status, message, kind, label) = rejection(&error);
            audit_rejection(state, kind);
            (status, json!({ "error": message }), label)
        }
    }
}

/// Handles `GET /api/status`: every visible reading.
async fn handle_list(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    list_response(&state, None)
}

/// Handles `GET /api/devices/{uid}/status`: visible readings for one device.
async fn handle_device_list(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> impl IntoResponse {
    list_response(&state, Some(DeviceUid::new(uid)))
}

/// Computes a read-path response with opportunistic decryption.
fn list_response(state: &AppState, filter: Option<DeviceUid>) -> (StatusCode, axum::Json<Value>) {
    match state.pipeline.store().find_all() {
        Ok(records) => {
            let views = visible_readings(&records, state.pipeline.keys(), filter.as_ref());
            match serde_json::to_value(views) {
                Ok(value) => (StatusCode::OK, axum::Json(value)),
                Err(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(json!({ "error": "failed to fetch readings" })),
                ),
            }
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({ "error": "failed to fetch readings" })),
        ),
    }
}

/// Handles `GET /healthz`.
async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, axum::Json(json!({ "status": "ok" })))
}

// ============================================================================
// SECTION: Outcome Mapping
// ============================================================================

/// Maps a request-fatal pipeline error onto the response contract.
const fn rejection(
    error: &IngestError,
) -> (StatusCode, &'static str, &'static str, IngestOutcomeLabel) {
    match error {
        IngestError::Integrity => (
            StatusCode::FORBIDDEN,
            "integrity verification failed",
            "integrity",
            IngestOutcomeLabel::IntegrityRejected,
        ),
        IngestError::Malformed(_) => (
            StatusCode::BAD_REQUEST,
            "malformed request body",
            "malformed",
            IngestOutcomeLabel::Malformed,
        ),
        IngestError::UnknownDevice(_) => (
            StatusCode::NOT_FOUND,
            "device not found",
            "unknown_device",
            IngestOutcomeLabel::UnknownDevice,
        ),
        IngestError::Storage(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage failure",
            "storage",
            IngestOutcomeLabel::StorageFailed,
        ),
    }
}

/// Audits an accepted submission.
fn audit_acceptance(state: &AppState, outcome: &IngestOutcome) {
    let (interpretation, interpretation_error) = match &outcome.interpretation {
        Interpretation::Parsed(_) => ("parsed", None),
        Interpretation::Failed {
            reason,
        } => ("failed", Some(reason.clone())),
    };
    let (enrichment, enrichment_detail) = match &outcome.enrichment {
        EnrichmentDisposition::Enqueued => ("enqueued", None),
        EnrichmentDisposition::SkippedUnknownDevice => ("skipped_unknown_device", None),
        EnrichmentDisposition::SkippedUninterpreted => ("skipped_uninterpreted", None),
        EnrichmentDisposition::Dropped {
            reason,
        } => ("dropped", Some(reason.clone())),
    };
    state.audit.record_ingest(&IngestAuditEvent {
        event: "ingest",
        timestamp_ms: now_millis(),
        outcome: "accepted",
        error_kind: None,
        version: Some(outcome.version.as_str()),
        record_id: Some(outcome.record_id.get()),
        interpretation: Some(interpretation),
        interpretation_error,
        enrichment: Some(enrichment),
        enrichment_detail,
    });
}

/// Audits a rejected submission.
fn audit_rejection(state: &AppState, kind: &'static str) {
    state.audit.record_ingest(&IngestAuditEvent {
        event: "ingest",
        timestamp_ms: now_millis(),
        outcome: "rejected",
        error_kind: Some(kind),
        version: None,
        record_id: None,
        interpretation: None,
        interpretation_error: None,
        enrichment: None,
        enrichment_detail: None,
    });
}

/// Returns the current wall-clock time as a record timestamp.
fn now_timestamp() -> Timestamp {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    Timestamp::from_millis(i64::try_from(millis).unwrap_or(i64::MAX))
}
