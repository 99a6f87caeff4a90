// crates/growthwire-core/tests/readback.rs
// ============================================================================
// Module: Read-Path Unit Tests
// Description: Targeted tests for opportunistic decryption and selection.
// Purpose: Validate silent omission and latest-per-bucket visibility.
// ============================================================================

//! ## Overview
//! Unit-level tests for read-path invariants:
//! - Undecryptable records are omitted, not surfaced as errors
//! - At most one reading is visible per dedup bucket
//! - Device filtering operates on decrypted identifiers

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
use growthwire_core::DeviceUid;
use growthwire_core::EnvelopeKeys;
use growthwire_core::NewStatusRecord;
use growthwire_core::PayloadEncoding;
use growthwire_core::InMemoryReadingStore;
use growthwire_core::ReadingStore;
use growthwire_core::StoredPayload;
use growthwire_core::Timestamp;
use growthwire_core::envelope::codec::hex_encode;
use growthwire_core::envelope::codec::pkcs7_pad;
use growthwire_core::visible_readings;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// AES-128-CBC encryptor used to build stored ciphertexts.
type Aes128CbcEnc = cbc::Encryptor<Aes128>;

const AES_KEY: [u8; 16] = [0x11; 16];
const AES_IV: [u8; 16] = [0x22; 16];

/// Milliseconds for a day, used to stay within one calendar month.
const DAY_MS: i64 = 24 * 60 * 60 * 1_000;

/// Milliseconds for forty days, used to cross a calendar month boundary.
const FORTY_DAYS_MS: i64 = 40 * DAY_MS;

fn keys() -> EnvelopeKeys {
    EnvelopeKeys::new(AES_KEY, AES_IV, b"fleet-hmac-key".to_vec())
}

fn cipher_payload(plaintext: &str) -> StoredPayload {
    let mut buffer = pkcs7_pad(plaintext.as_bytes());
    let length = buffer.len();
    let encryptor = Aes128CbcEnc::new_from_slices(&AES_KEY, &AES_IV).unwrap();
    encryptor.encrypt_padded_mut::<NoPadding>(&mut buffer, length).unwrap();
    StoredPayload::Cipher {
        encoding: PayloadEncoding::Hex,
        ciphertext: hex_encode(&buffer),
    }
}

fn store_cipher(store: &InMemoryReadingStore, plaintext: &str, at_millis: i64) {
    store
        .create(&NewStatusRecord {
            device_uid: None,
            payload: cipher_payload(plaintext),
            created_at: Timestamp::from_millis(at_millis),
        })
        .unwrap();
}

// ============================================================================
// SECTION: Silent Omission
// ============================================================================

#[test]
fn corrupt_records_are_silently_omitted() {
    let store = InMemoryReadingStore::new();
    store_cipher(&store, r#"{"uid":"T1","age":12,"height":75.0,"status":"normal"}"#, DAY_MS);
    store
        .create(&NewStatusRecord {
            device_uid: None,
            payload: StoredPayload::Cipher {
                encoding: PayloadEncoding::Hex,
                ciphertext: "no-hex-here".to_string(),
            },
            created_at: Timestamp::from_millis(2 * DAY_MS),
        })
        .unwrap();
    store_cipher(&store, "garbled interior", 3 * DAY_MS);

    let views = visible_readings(&store.find_all().unwrap(), &keys(), None);
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].uid, DeviceUid::new("T1"));
}

// ============================================================================
// SECTION: Bucket Selection
// ============================================================================

#[test]
fn same_bucket_shows_only_the_latest_record() {
    let store = InMemoryReadingStore::new();
    store_cipher(&store, r#"{"uid":"T1","age":12,"height":75.0,"status":"normal"}"#, DAY_MS);
    store_cipher(&store, r#"{"uid":"T1","age":12,"height":76.5,"status":"watch"}"#, 2 * DAY_MS);

    let views = visible_readings(&store.find_all().unwrap(), &keys(), None);
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].height, 76.5);
    assert_eq!(views[0].status, "watch");
}

#[test]
fn different_months_keep_separate_records() {
    let store = InMemoryReadingStore::new();
    store_cipher(&store, r#"{"uid":"T1","age":12,"height":75.0,"status":"normal"}"#, DAY_MS);
    store_cipher(
        &store,
        r#"{"uid":"T1","age":12,"height":76.5,"status":"normal"}"#,
        FORTY_DAYS_MS,
    );

    let views = visible_readings(&store.find_all().unwrap(), &keys(), None);
    assert_eq!(views.len(), 2);
    // Ordered by creation timestamp descending.
    assert_eq!(views[0].height, 76.5);
    assert_eq!(views[1].height, 75.0);
}

#[test]
fn different_ages_keep_separate_records() {
    let store = InMemoryReadingStore::new();
    store_cipher(&store, r#"{"uid":"T1","age":12,"height":75.0,"status":"normal"}"#, DAY_MS);
    store_cipher(&store, r#"{"uid":"T1","age":13,"height":75.4,"status":"normal"}"#, 2 * DAY_MS);

    let views = visible_readings(&store.find_all().unwrap(), &keys(), None);
    assert_eq!(views.len(), 2);
}

// ============================================================================
// SECTION: Filtering
// ============================================================================

#[test]
fn filter_matches_decrypted_device_identifier() {
    let store = InMemoryReadingStore::new();
    store_cipher(&store, r#"{"uid":"T1","age":12,"height":75.0,"status":"normal"}"#, DAY_MS);
    store_cipher(&store, r#"{"uid":"T2","age":9,"height":70.0,"status":"normal"}"#, 2 * DAY_MS);

    let uid = DeviceUid::new("T2");
    let views = visible_readings(&store.find_all().unwrap(), &keys(), Some(&uid));
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].uid, uid);
}

#[test]
fn recommendation_is_carried_into_the_view() {
    let store = InMemoryReadingStore::new();
    store_cipher(&store, r#"{"uid":"T1","age":12,"height":75.0,"status":"normal"}"#, DAY_MS);
    let record = &store.find_all().unwrap()[0];
    store.set_recommendation(record.id, "continue monitoring").unwrap();

    let views = visible_readings(&store.find_all().unwrap(), &keys(), None);
    assert_eq!(views[0].recommendation.as_deref(), Some("continue monitoring"));
}
