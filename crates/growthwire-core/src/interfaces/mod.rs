// crates/growthwire-core/src/interfaces/mod.rs
// ============================================================================
// Module: Growthwire Interfaces
// Description: Backend-agnostic interfaces for storage, registry, and scoring.
// Purpose: Define the contract surfaces used by the ingestion pipeline.
// Dependencies: async-trait, serde, thiserror, crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the pipeline integrates with external systems
//! without embedding backend-specific details. The store provides per-record
//! atomic updates (last-write-wins on the recommendation field); no
//! multi-record transactions are required. The registry and scorer are
//! external collaborators and must be treated as unreliable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::DeviceUid;
use crate::core::identifiers::ReadingId;
use crate::core::telemetry::NewStatusRecord;
use crate::core::telemetry::PlainDedupKey;
use crate::core::telemetry::StatusRecord;
use crate::core::telemetry::StoredPayload;

// ============================================================================
// SECTION: Reading Store
// ============================================================================

/// Store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never embed payload contents.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Backend engine error.
    #[error("store error: {0}")]
    Store(String),
    /// Invalid stored data.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Referenced record does not exist.
    #[error("store record not found")]
    NotFound,
}

/// Durable store for status records.
///
/// Implementations must provide per-record atomic update semantics; the
/// recommendation field is last-write-wins.
pub trait ReadingStore: Send + Sync {
    /// Persists a new record and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the record cannot be made durable.
    fn create(&self, record: &NewStatusRecord) -> Result<ReadingId, StoreError>;

    /// Returns the record with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_by_id(&self, id: ReadingId) -> Result<Option<StatusRecord>, StoreError>;

    /// Returns the current plaintext record for a write-time dedup key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_plain_by_dedup(&self, key: &PlainDedupKey)
    -> Result<Option<StatusRecord>, StoreError>;

    /// Overwrites the reading fields of an existing plaintext record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the record does not exist or is
    /// not a plaintext record.
    fn update_plain_reading(
        &self,
        id: ReadingId,
        age: u32,
        height: f64,
        status: &str,
    ) -> Result<(), StoreError>;

    /// Patches the recommendation field of an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the record does not exist.
    fn set_recommendation(&self, id: ReadingId, recommendation: &str) -> Result<(), StoreError>;

    /// Returns all records ordered by creation timestamp descending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the scan fails.
    fn find_all(&self) -> Result<Vec<StatusRecord>, StoreError>;
}

// ============================================================================
// SECTION: Device Registry
// ============================================================================

/// Registry errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone)]
pub enum RegistryError {
    /// Registry backend reported an error.
    #[error("registry error: {0}")]
    Registry(String),
}

/// Registered device metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Device identifier.
    pub uid: DeviceUid,
    /// Human-readable subject name.
    pub name: String,
    /// Subject gender, forwarded to the scorer at enrichment time.
    pub gender: String,
}

/// Device registry, an external collaborator to this core.
pub trait DeviceRegistry: Send + Sync {
    /// Resolves a device identifier to its registration record.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the lookup fails.
    fn find(&self, uid: &DeviceUid) -> Result<Option<DeviceRecord>, RegistryError>;
}

// ============================================================================
// SECTION: Enrichment
// ============================================================================

/// Unit of enrichment work derived from an accepted reading.
///
/// # Invariants
/// - `record_id` refers to an already-persisted record; the worker patches
///   only that record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentJob {
    /// Identifier of the record to patch.
    pub record_id: ReadingId,
    /// Device identifier.
    pub uid: DeviceUid,
    /// Reported age in device-local units (months).
    pub age: u32,
    /// Reported height measurement.
    pub height: f64,
    /// Subject gender from the device registry.
    pub gender: String,
    /// Raw status classification.
    pub status: String,
}

/// Enqueue errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is at capacity; the job is dropped.
    #[error("enrichment queue full")]
    Full,
    /// The worker has shut down.
    #[error("enrichment queue closed")]
    Closed,
}

/// Bounded, non-blocking handoff to the enrichment reconciler.
///
/// Enqueueing must never block the acknowledgment path; a full queue is a
/// drop, not a wait.
pub trait EnrichmentQueue: Send + Sync {
    /// Submits a job without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`EnqueueError`] when the job cannot be accepted.
    fn enqueue(&self, job: EnrichmentJob) -> Result<(), EnqueueError>;
}

// ============================================================================
// SECTION: Recommendation Scorer
// ============================================================================

/// Scorer client errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone)]
pub enum ScorerError {
    /// Request could not be sent or completed.
    #[error("scorer request failed: {0}")]
    Request(String),
    /// Request exceeded the configured deadline.
    #[error("scorer request timed out")]
    Timeout,
    /// Scorer answered with a non-success status.
    #[error("scorer returned status {0}")]
    Status(u16),
    /// Response exceeded the configured size limit.
    #[error("scorer response too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Observed response size in bytes.
        actual_bytes: usize,
    },
    /// Response body was not a valid score payload.
    #[error("scorer response malformed: {0}")]
    Malformed(String),
}

/// External recommendation scorer, untrusted and unreliable.
#[async_trait]
pub trait RecommendationScorer: Send + Sync {
    /// Scores a reading, returning the recommendation when the scorer
    /// produced one.
    ///
    /// # Errors
    ///
    /// Returns [`ScorerError`] when the call fails in any way.
    async fn score(&self, job: &EnrichmentJob) -> Result<Option<String>, ScorerError>;
}

// ============================================================================
// SECTION: In-Memory Reference Implementations
// ============================================================================

/// In-memory reading store for tests and memory-backed deployments.
///
/// # Invariants
/// - Identifiers are assigned sequentially starting at 1.
#[derive(Debug, Default)]
pub struct InMemoryReadingStore {
    /// Stored records in insertion order.
    records: Mutex<Vec<StatusRecord>>,
    /// Next identifier to assign.
    next_id: AtomicU64,
}

impl InMemoryReadingStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    /// Returns whether the store is empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_empty())
    }

    /// Acquires the record lock.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<StatusRecord>>, StoreError> {
        self.records.lock().map_err(|_| StoreError::Store("store mutex poisoned".to_string()))
    }
}

impl ReadingStore for InMemoryReadingStore {
    fn create(&self, record: &NewStatusRecord) -> Result<ReadingId, StoreError> {
        let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = ReadingId::from_raw(raw)
            .ok_or_else(|| StoreError::Invalid("identifier overflow".to_string()))?;
        self.lock()?.push(StatusRecord {
            id,
            device_uid: record.device_uid.clone(),
            payload: record.payload.clone(),
            created_at: record.created_at,
            recommendation: None,
        });
        Ok(id)
    }

    fn find_by_id(&self, id: ReadingId) -> Result<Option<StatusRecord>, StoreError> {
        Ok(self.lock()?.iter().find(|record| record.id == id).cloned())
    }

    fn find_plain_by_dedup(
        &self,
        key: &PlainDedupKey,
    ) -> Result<Option<StatusRecord>, StoreError> {
        let records = self.lock()?;
        let mut matches: Vec<&StatusRecord> = records
            .iter()
            .filter(|record| {
                record.device_uid.as_ref() == Some(&key.uid)
                    && matches!(
                        record.payload,
                        StoredPayload::Plain { age, .. } if age == key.age
                    )
            })
            .collect();
        matches.sort_by_key(|record| record.created_at);
        Ok(matches.last().map(|record| (*record).clone()))
    }

    fn update_plain_reading(
        &self,
        id: ReadingId,
        age: u32,
        height: f64,
        status: &str,
    ) -> Result<(), StoreError> {
        let mut records = self.lock()?;
        let record = records
            .iter_mut()
            .find(|record| record.id == id && matches!(record.payload, StoredPayload::Plain { .. }))
            .ok_or(StoreError::NotFound)?;
        record.payload = StoredPayload::Plain {
            age,
            height,
            status: status.to_string(),
        };
        Ok(())
    }

    fn set_recommendation(&self, id: ReadingId, recommendation: &str) -> Result<(), StoreError> {
        let mut records = self.lock()?;
        let record =
            records.iter_mut().find(|record| record.id == id).ok_or(StoreError::NotFound)?;
        record.recommendation = Some(recommendation.to_string());
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<StatusRecord>, StoreError> {
        let mut records = self.lock()?.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }
}

/// In-memory device registry for tests and memory-backed deployments.
#[derive(Debug, Default)]
pub struct InMemoryDeviceRegistry {
    /// Registered devices keyed by identifier.
    devices: Mutex<BTreeMap<String, DeviceRecord>>,
}

impl InMemoryDeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registers a device, replacing any previous registration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the registry lock is poisoned.
    pub fn register(&self, device: DeviceRecord) -> Result<(), RegistryError> {
        self.devices
            .lock()
            .map_err(|_| RegistryError::Registry("registry mutex poisoned".to_string()))?
            .insert(device.uid.as_str().to_string(), device);
        Ok(())
    }
}

impl DeviceRegistry for InMemoryDeviceRegistry {
    fn find(&self, uid: &DeviceUid) -> Result<Option<DeviceRecord>, RegistryError> {
        Ok(self
            .devices
            .lock()
            .map_err(|_| RegistryError::Registry("registry mutex poisoned".to_string()))?
            .get(uid.as_str())
            .cloned())
    }
}
