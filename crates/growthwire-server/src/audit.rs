// crates/growthwire-server/src/audit.rs
// ============================================================================
// Module: Server Audit Logging
// Description: Structured audit events for ingestion and enrichment.
// Purpose: Emit redacted audit logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for ingestion and
//! enrichment logging. It is intentionally lightweight so deployments can
//! route events to their preferred logging pipeline without redesign. Events
//! carry labels and identifiers, never ciphertext, plaintext readings, or key
//! material.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Ingestion audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request outcome label (`accepted` or `rejected`).
    pub outcome: &'static str,
    /// Normalized error kind label for rejections.
    pub error_kind: Option<&'static str>,
    /// Protocol version label when classified.
    pub version: Option<&'static str>,
    /// Durable record identifier when persisted.
    pub record_id: Option<u64>,
    /// Interpretation label (`parsed` or `failed`).
    pub interpretation: Option<&'static str>,
    /// Interpretation failure description.
    pub interpretation_error: Option<String>,
    /// Enrichment disposition label.
    pub enrichment: Option<&'static str>,
    /// Enrichment drop description.
    pub enrichment_detail: Option<String>,
}

/// Enrichment audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Identifier of the record the job patches.
    pub record_id: u64,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// Attempt outcome label.
    pub outcome: &'static str,
    /// Failure description when present.
    pub detail: Option<String>,
}

/// Returns the current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for server events.
pub trait AuditSink: Send + Sync {
    /// Record an ingestion audit event.
    fn record_ingest(&self, event: &IngestAuditEvent);

    /// Record an enrichment audit event.
    fn record_enrichment(&self, event: &EnrichmentAuditEvent);
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_ingest(&self, event: &IngestAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_enrichment(&self, event: &EnrichmentAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record_ingest(&self, event: &IngestAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }

    fn record_enrichment(&self, event: &EnrichmentAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Audit sink that drops every event.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_ingest(&self, _event: &IngestAuditEvent) {}

    fn record_enrichment(&self, _event: &EnrichmentAuditEvent) {}
}
