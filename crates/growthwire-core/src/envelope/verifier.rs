// crates/growthwire-core/src/envelope/verifier.rs
// ============================================================================
// Module: Envelope Verifier
// Description: HMAC-SHA-256 tag computation and constant-time verification.
// Purpose: Authenticate envelopes before any decryption is attempted.
// Dependencies: hmac, sha2, subtle
// ============================================================================

//! ## Overview
//! Computes the expected authentication tag over an envelope payload and
//! compares it to the device-provided tag in constant time, closing the
//! timing side channel a byte-by-byte comparison would open. Verification
//! returns a plain boolean and never errors; a `false` verdict terminates the
//! pipeline before decryption, since decrypting unauthenticated ciphertext is
//! forbidden.

// ============================================================================
// SECTION: Imports
// ============================================================================

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use subtle::ConstantTimeEq;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// HMAC-SHA-256 instantiation used for envelope tags.
type HmacSha256 = Hmac<Sha256>;

/// Length of an envelope authentication tag in bytes.
pub const TAG_LENGTH: usize = 32;

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Computes the authentication tag over `payload` using `key`.
///
/// Returns an empty vector when the MAC cannot be keyed; HMAC accepts keys of
/// any length, so this does not occur for real key material.
#[must_use]
pub fn compute_tag(payload: &[u8], key: &[u8]) -> Vec<u8> {
    HmacSha256::new_from_slice(key).map_or_else(
        |_| Vec::new(),
        |mut mac| {
            mac.update(payload);
            mac.finalize().into_bytes().to_vec()
        },
    )
}

/// Verifies a device-provided tag against the expected tag for `payload`.
///
/// Returns `false`, never an error, on any mismatch including a tag of the
/// wrong length.
#[must_use]
pub fn verify(payload: &[u8], provided_tag: &[u8], key: &[u8]) -> bool {
    let expected = compute_tag(payload, key);
    if expected.is_empty() {
        return false;
    }
    constant_time_eq(&expected, provided_tag)
}

/// Compares two byte slices in constant time.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
