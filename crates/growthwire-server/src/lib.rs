// crates/growthwire-server/src/lib.rs
// ============================================================================
// Module: Growthwire Server
// Description: HTTP ingestion binding and enrichment reconciler.
// Purpose: Expose the ingestion core to field devices and the scorer.
// Dependencies: growthwire-core, growthwire-config, axum, tokio
// ============================================================================

//! ## Overview
//! The Growthwire server binds the ingestion pipeline to HTTP, persists
//! through the configured store backend, and runs the supervised enrichment
//! reconciler that patches scorer recommendations onto acknowledged records.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod config;
pub mod reconciler;
pub mod server;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::EnrichmentAuditEvent;
pub use audit::FileAuditSink;
pub use audit::IngestAuditEvent;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use config::GrowthwireConfig;
pub use reconciler::EnrichmentQueueHandle;
pub use reconciler::Reconciler;
pub use reconciler::ReconcilerConfig;
pub use server::GrowthwireServer;
pub use server::ServerError;
pub use telemetry::INGEST_LATENCY_BUCKETS_MS;
pub use telemetry::IngestMetrics;
pub use telemetry::IngestOutcomeLabel;
pub use telemetry::NoopMetrics;
