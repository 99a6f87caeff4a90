// crates/growthwire-core/src/runtime/readback.rs
// ============================================================================
// Module: Read-Path Selection
// Description: Opportunistic decryption and latest-per-bucket selection.
// Purpose: Produce the visible reading set from stored records.
// Dependencies: crate::core, crate::envelope
// ============================================================================

//! ## Overview
//! The read path decrypts each stored ciphertext opportunistically and
//! silently omits records that fail to decrypt or parse; a single corrupt
//! record must never poison the result set. Encrypted records are immutable,
//! so the dedup key `(device, calendar month, reported age)` selects the
//! latest record per bucket here, at read time, rather than at write time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::core::identifiers::DeviceUid;
use crate::core::telemetry::BucketKey;
use crate::core::telemetry::PayloadEncoding;
use crate::core::telemetry::ReadingView;
use crate::core::telemetry::StatusRecord;
use crate::core::telemetry::StoredPayload;
use crate::envelope::EnvelopeKeys;
use crate::envelope::codec;
use crate::envelope::decryptor;

// ============================================================================
// SECTION: Selection
// ============================================================================

/// Produces the visible reading set from stored records.
///
/// Records that fail to decode, decrypt, or parse are omitted without error.
/// At most one reading per dedup bucket survives: the one with the latest
/// creation timestamp (ties broken by record identifier). Output is ordered
/// by creation timestamp descending.
#[must_use]
pub fn visible_readings(
    records: &[StatusRecord],
    keys: &EnvelopeKeys,
    filter: Option<&DeviceUid>,
) -> Vec<ReadingView> {
    let mut latest: BTreeMap<BucketKey, ReadingView> = BTreeMap::new();
    for record in records {
        let Some(view) = interpret_record(record, keys) else {
            continue;
        };
        if filter.is_some_and(|uid| *uid != view.uid) {
            continue;
        }
        let Some(bucket) = record.created_at.month_bucket() else {
            continue;
        };
        let key = BucketKey {
            uid: view.uid.clone(),
            bucket,
            age: view.age,
        };
        let superseded = latest.get(&key).is_none_or(|current| {
            (current.created_at, current.id) < (view.created_at, view.id)
        });
        if superseded {
            latest.insert(key, view);
        }
    }
    let mut views: Vec<ReadingView> = latest.into_values().collect();
    views.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    views
}

/// Interprets a single stored record, returning `None` on any failure.
fn interpret_record(record: &StatusRecord, keys: &EnvelopeKeys) -> Option<ReadingView> {
    match &record.payload {
        StoredPayload::Plain {
            age,
            height,
            status,
        } => {
            let uid = record.device_uid.clone()?;
            Some(ReadingView {
                id: record.id,
                uid,
                age: *age,
                height: *height,
                status: status.clone(),
                created_at: record.created_at,
                recommendation: record.recommendation.clone(),
            })
        }
        StoredPayload::Cipher {
            encoding,
            ciphertext,
        } => {
            let bytes = match encoding {
                PayloadEncoding::Hex => codec::hex_decode(ciphertext).ok()?,
                PayloadEncoding::Base64 => BASE64.decode(ciphertext).ok()?,
            };
            let reading = decryptor::decrypt_reading(&bytes, keys).ok()?;
            Some(ReadingView {
                id: record.id,
                uid: reading.uid,
                age: reading.age,
                height: reading.height,
                status: reading.status,
                created_at: record.created_at,
                recommendation: record.recommendation.clone(),
            })
        }
    }
}
