// crates/growthwire-server/src/telemetry.rs
// ============================================================================
// Module: Server Telemetry
// Description: Observability hooks for ingestion request handling.
// Purpose: Provide metric events and latency buckets without hard deps.
// Dependencies: std
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for ingestion counters and
//! latency histograms. It is intentionally dependency-light so downstream
//! deployments can plug in Prometheus or OpenTelemetry without redesign.
//! Labels must never carry payload contents.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for ingestion histograms.
pub const INGEST_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Ingestion outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum IngestOutcomeLabel {
    /// Reading accepted (including partial-interpretation accepts).
    Accepted,
    /// Envelope authentication failed.
    IntegrityRejected,
    /// Body matched no protocol shape.
    Malformed,
    /// Plaintext submission named an unregistered device.
    UnknownDevice,
    /// Record could not be made durable.
    StorageFailed,
}

impl IngestOutcomeLabel {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::IntegrityRejected => "integrity_rejected",
            Self::Malformed => "malformed",
            Self::UnknownDevice => "unknown_device",
            Self::StorageFailed => "storage_failed",
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for ingestion requests and latencies.
pub trait IngestMetrics: Send + Sync {
    /// Records a request counter event.
    fn record_ingest(&self, outcome: IngestOutcomeLabel);

    /// Records a latency observation for the request.
    fn record_latency(&self, outcome: IngestOutcomeLabel, latency: Duration);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl IngestMetrics for NoopMetrics {
    fn record_ingest(&self, _outcome: IngestOutcomeLabel) {}

    fn record_latency(&self, _outcome: IngestOutcomeLabel, _latency: Duration) {}
}
