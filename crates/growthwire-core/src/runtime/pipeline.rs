// crates/growthwire-core/src/runtime/pipeline.rs
// ============================================================================
// Module: Ingestion Pipeline
// Description: Verify, persist, decrypt, parse, resolve, and enqueue enrichment.
// Purpose: Orchestrate the ingestion state machine and its failure policy.
// Dependencies: crate::core, crate::envelope, crate::interfaces
// ============================================================================

//! ## Overview
//! The pipeline drives a submission through
//! `Received → TagVerified → Persisted → Decrypted → Parsed → Resolved →
//! Acknowledged`, with enrichment detached after acknowledgment. The failure
//! policy is the contract: failures before durable persistence reject the
//! request; failures after persistence never do. An envelope is stored
//! verbatim immediately after tag verification, before any decrypt attempt:
//! a device report must never be lost to a decrypt-time bug, and redelivery
//! is expensive on constrained hardware.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::identifiers::ReadingId;
use crate::core::telemetry::NewStatusRecord;
use crate::core::telemetry::PayloadEncoding;
use crate::core::telemetry::PlainDedupKey;
use crate::core::telemetry::StoredPayload;
use crate::core::telemetry::TelemetryReading;
use crate::core::time::Timestamp;
use crate::envelope::Envelope;
use crate::envelope::EnvelopeKeys;
use crate::envelope::EnvelopeVersion;
use crate::envelope::IngestBody;
use crate::envelope::IngestSubmission;
use crate::envelope::codec;
use crate::envelope::decode_ciphertext;
use crate::envelope::decryptor;
use crate::envelope::verifier;
use crate::interfaces::DeviceRegistry;
use crate::interfaces::EnrichmentJob;
use crate::interfaces::EnrichmentQueue;
use crate::interfaces::ReadingStore;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Request-fatal ingestion errors.
///
/// Everything that happens after durable persistence is reported on the
/// [`IngestOutcome`] instead.
///
/// # Invariants
/// - Variants are stable for transport-layer status mapping.
#[derive(Debug, Error, Clone)]
pub enum IngestError {
    /// Envelope authentication failed; nothing was persisted.
    #[error("integrity verification failed")]
    Integrity,
    /// Body matches no known protocol shape.
    #[error("malformed submission: {0}")]
    Malformed(String),
    /// Plaintext submission names an unregistered device.
    #[error("unknown device: {0}")]
    UnknownDevice(String),
    /// The record could not be made durable.
    #[error("storage failure: {0}")]
    Storage(String),
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Result of interpreting a persisted envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// The envelope decrypted and parsed into a structured reading.
    Parsed(TelemetryReading),
    /// The envelope is durable but could not be interpreted.
    Failed {
        /// Stage-specific rejection description.
        reason: String,
    },
}

/// Disposition of the enrichment hand-off for an accepted reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentDisposition {
    /// A job was enqueued for the reconciler.
    Enqueued,
    /// The device is not registered; the reading is retained without
    /// enrichment.
    SkippedUnknownDevice,
    /// The envelope could not be interpreted; there is nothing to score.
    SkippedUninterpreted,
    /// A job could not be handed off; it is dropped, never retried.
    Dropped {
        /// Drop description for audit.
        reason: String,
    },
}

/// Acknowledged ingestion outcome.
///
/// # Invariants
/// - `record_id` refers to a durable record; an outcome exists only after
///   persistence succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    /// Identifier of the durable record.
    pub record_id: ReadingId,
    /// Protocol version of the submission.
    pub version: EnvelopeVersion,
    /// Whether the stored payload was interpretable.
    pub interpretation: Interpretation,
    /// Enrichment hand-off disposition.
    pub enrichment: EnrichmentDisposition,
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Ingestion pipeline with injected collaborators.
///
/// # Invariants
/// - Key material is immutable for the lifetime of the pipeline.
/// - `ingest` never blocks on enrichment.
pub struct IngestPipeline {
    /// Durable record store.
    store: Arc<dyn ReadingStore>,
    /// Device registry collaborator.
    registry: Arc<dyn DeviceRegistry>,
    /// Bounded hand-off to the enrichment reconciler.
    enrichment: Arc<dyn EnrichmentQueue>,
    /// Fleet-shared envelope key material.
    keys: EnvelopeKeys,
}

impl IngestPipeline {
    /// Creates a pipeline over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ReadingStore>,
        registry: Arc<dyn DeviceRegistry>,
        enrichment: Arc<dyn EnrichmentQueue>,
        keys: EnvelopeKeys,
    ) -> Self {
        Self {
            store,
            registry,
            enrichment,
            keys,
        }
    }

    /// Returns the envelope key material used by this pipeline.
    #[must_use]
    pub const fn keys(&self) -> &EnvelopeKeys {
        &self.keys
    }

    /// Returns the store this pipeline persists into.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        &self.store
    }

    /// Drives a submission through the ingestion state machine.
    ///
    /// `now` is the caller-supplied creation timestamp for new records.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] only for failures that precede durable
    /// persistence; every later failure is reported on the outcome.
    pub fn ingest(&self, body: &IngestBody, now: Timestamp) -> Result<IngestOutcome, IngestError> {
        match body.classify().map_err(IngestError::Malformed)? {
            IngestSubmission::Plain(reading) => self.ingest_plain(&reading, now),
            IngestSubmission::Enveloped {
                envelope,
                version,
            } => self.ingest_envelope(&envelope, version, now),
        }
    }

    /// Ingests a legacy plaintext submission with write-time dedup.
    fn ingest_plain(
        &self,
        reading: &TelemetryReading,
        now: Timestamp,
    ) -> Result<IngestOutcome, IngestError> {
        let device = self
            .registry
            .find(&reading.uid)
            .map_err(|err| IngestError::Storage(err.to_string()))?
            .ok_or_else(|| IngestError::UnknownDevice(reading.uid.to_string()))?;

        let key = PlainDedupKey {
            uid: reading.uid.clone(),
            age: reading.age,
        };
        let existing = self
            .store
            .find_plain_by_dedup(&key)
            .map_err(|err| IngestError::Storage(err.to_string()))?;

        let record_id = match existing {
            Some(record) => {
                self.store
                    .update_plain_reading(record.id, reading.age, reading.height, &reading.status)
                    .map_err(|err| IngestError::Storage(err.to_string()))?;
                record.id
            }
            None => self
                .store
                .create(&NewStatusRecord {
                    device_uid: Some(reading.uid.clone()),
                    payload: StoredPayload::Plain {
                        age: reading.age,
                        height: reading.height,
                        status: reading.status.clone(),
                    },
                    created_at: now,
                })
                .map_err(|err| IngestError::Storage(err.to_string()))?,
        };

        let enrichment = self.enqueue_job(EnrichmentJob {
            record_id,
            uid: reading.uid.clone(),
            age: reading.age,
            height: reading.height,
            gender: device.gender,
            status: reading.status.clone(),
        });

        Ok(IngestOutcome {
            record_id,
            version: EnvelopeVersion::V1Plain,
            interpretation: Interpretation::Parsed(reading.clone()),
            enrichment,
        })
    }

    /// Ingests an encrypted envelope: verify, persist, then interpret.
    fn ingest_envelope(
        &self,
        envelope: &Envelope,
        version: EnvelopeVersion,
        now: Timestamp,
    ) -> Result<IngestOutcome, IngestError> {
        // Received -> TagVerified. A tag that does not even decode can never
        // verify; both paths are the same integrity rejection.
        let Ok(provided_tag) = codec::hex_decode(&envelope.hmac) else {
            return Err(IngestError::Integrity);
        };
        if !verifier::verify(envelope.payload.as_bytes(), &provided_tag, self.keys.hmac_key()) {
            return Err(IngestError::Integrity);
        }

        // TagVerified -> Persisted, before any decrypt attempt.
        let encoding = match version {
            EnvelopeVersion::V3HexAes => PayloadEncoding::Hex,
            EnvelopeVersion::V1Plain | EnvelopeVersion::V2TextAes => PayloadEncoding::Base64,
        };
        let record_id = self
            .store
            .create(&NewStatusRecord {
                device_uid: None,
                payload: StoredPayload::Cipher {
                    encoding,
                    ciphertext: envelope.payload.clone(),
                },
                created_at: now,
            })
            .map_err(|err| IngestError::Storage(err.to_string()))?;

        // Persisted -> Decrypted -> Parsed. Nothing from here on fails the
        // request; the envelope is already durable.
        let interpretation = match decode_ciphertext(&envelope.payload, version)
            .map_err(|err| err.to_string())
            .and_then(|ciphertext| {
                decryptor::decrypt_reading(&ciphertext, &self.keys).map_err(|err| err.to_string())
            }) {
            Ok(reading) => Interpretation::Parsed(reading),
            Err(reason) => Interpretation::Failed {
                reason,
            },
        };

        // Parsed -> Resolved -> enrichment hand-off.
        let enrichment = match &interpretation {
            Interpretation::Failed {
                ..
            } => EnrichmentDisposition::SkippedUninterpreted,
            Interpretation::Parsed(reading) => match self.registry.find(&reading.uid) {
                Ok(Some(device)) => self.enqueue_job(EnrichmentJob {
                    record_id,
                    uid: reading.uid.clone(),
                    age: reading.age,
                    height: reading.height,
                    gender: device.gender,
                    status: reading.status.clone(),
                }),
                Ok(None) => EnrichmentDisposition::SkippedUnknownDevice,
                Err(err) => EnrichmentDisposition::Dropped {
                    reason: format!("registry lookup failed: {err}"),
                },
            },
        };

        Ok(IngestOutcome {
            record_id,
            version,
            interpretation,
            enrichment,
        })
    }

    /// Hands a job to the reconciler without blocking.
    fn enqueue_job(&self, job: EnrichmentJob) -> EnrichmentDisposition {
        match self.enrichment.enqueue(job) {
            Ok(()) => EnrichmentDisposition::Enqueued,
            Err(err) => EnrichmentDisposition::Dropped {
                reason: err.to_string(),
            },
        }
    }
}
