// crates/growthwire-core/src/core/telemetry.rs
// ============================================================================
// Module: Growthwire Telemetry Model
// Description: Decrypted readings, stored record shapes, and dedup keys.
// Purpose: Define the canonical data model shared by pipeline, store, and reads.
// Dependencies: serde, crate::core
// ============================================================================

//! ## Overview
//! A [`TelemetryReading`] is the structured payload a device reports after
//! envelope verification and decryption. A [`StatusRecord`] is the durable
//! form: either plaintext fields (legacy protocol) or the verbatim envelope
//! ciphertext retained for audit and replay. Dedup keys identify "the current
//! reading" a new submission may supersede.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::DeviceUid;
use crate::core::identifiers::ReadingId;
use crate::core::time::MonthBucket;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Decrypted Reading
// ============================================================================

/// Structured telemetry record decrypted from a device envelope.
///
/// # Invariants
/// - All fields are required; a payload missing any of them is malformed.
/// - `gender` is intentionally absent: it is sourced from the device registry
///   at enrichment time, never trusted from the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    /// Device identifier, resolved against the registry before enrichment.
    pub uid: DeviceUid,
    /// Reported age in device-local units (months).
    pub age: u32,
    /// Reported height measurement.
    pub height: f64,
    /// Raw status classification as reported by the device.
    pub status: String,
}

// ============================================================================
// SECTION: Stored Record
// ============================================================================

/// Encoding of a persisted ciphertext payload.
///
/// # Invariants
/// - Labels are stable wire/storage forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding {
    /// Hex-encoded ciphertext (protocol v3).
    Hex,
    /// Base64-encoded ciphertext (protocol v2).
    Base64,
}

impl PayloadEncoding {
    /// Returns the stable storage label for this encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hex => "hex",
            Self::Base64 => "base64",
        }
    }

    /// Parses a storage label back into an encoding.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "hex" => Some(Self::Hex),
            "base64" => Some(Self::Base64),
            _ => None,
        }
    }
}

/// Durable payload of a status record.
///
/// # Invariants
/// - `Cipher` retains the envelope ciphertext verbatim as submitted, even when
///   it later proves undecryptable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredPayload {
    /// Plaintext reading fields (legacy v1 protocol).
    Plain {
        /// Reported age in device-local units (months).
        age: u32,
        /// Reported height measurement.
        height: f64,
        /// Raw status classification.
        status: String,
    },
    /// Verbatim envelope ciphertext, decrypted lazily at read time.
    Cipher {
        /// Encoding of the ciphertext string.
        encoding: PayloadEncoding,
        /// Ciphertext exactly as submitted.
        ciphertext: String,
    },
}

/// Status record as submitted for persistence.
///
/// # Invariants
/// - `device_uid` is set only for plaintext-variant records, where the
///   identifier is known before the record is created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStatusRecord {
    /// Device identifier for plaintext-variant records.
    pub device_uid: Option<DeviceUid>,
    /// Durable payload.
    pub payload: StoredPayload,
    /// Creation timestamp, the authoritative ordering key.
    pub created_at: Timestamp,
}

/// Persisted status record.
///
/// # Invariants
/// - `recommendation` is populated only by the enrichment reconciler.
/// - Records are never deleted by this core.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    /// Store-assigned identifier.
    pub id: ReadingId,
    /// Device identifier for plaintext-variant records.
    pub device_uid: Option<DeviceUid>,
    /// Durable payload.
    pub payload: StoredPayload,
    /// Creation timestamp, the authoritative ordering key.
    pub created_at: Timestamp,
    /// Recommendation patched in by the reconciler when a score arrives.
    pub recommendation: Option<String>,
}

// ============================================================================
// SECTION: Dedup Keys
// ============================================================================

/// Write-time dedup key for the plaintext protocol variant.
///
/// # Invariants
/// - At most one visible plaintext record exists per key; later writes update
///   the matching record in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlainDedupKey {
    /// Device identifier.
    pub uid: DeviceUid,
    /// Reported age in device-local units (months).
    pub age: u32,
}

/// Read-time dedup key for encrypted-at-rest records.
///
/// # Invariants
/// - Encrypted records are immutable; this key selects which historical record
///   represents the latest reading for a bucket at read time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    /// Device identifier.
    pub uid: DeviceUid,
    /// Calendar bucket of the record creation timestamp.
    pub bucket: MonthBucket,
    /// Reported age in device-local units (months).
    pub age: u32,
}

// ============================================================================
// SECTION: Read View
// ============================================================================

/// Reading as exposed by the read path after opportunistic decryption.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingView {
    /// Store-assigned record identifier.
    pub id: ReadingId,
    /// Device identifier.
    pub uid: DeviceUid,
    /// Reported age in device-local units (months).
    pub age: u32,
    /// Reported height measurement.
    pub height: f64,
    /// Raw status classification.
    pub status: String,
    /// Record creation timestamp.
    pub created_at: Timestamp,
    /// Recommendation when enrichment has completed.
    pub recommendation: Option<String>,
}
