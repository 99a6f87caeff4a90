// crates/growthwire-core/src/envelope/decryptor.rs
// ============================================================================
// Module: Envelope Decryptor
// Description: AES-128-CBC decryption and telemetry payload parsing.
// Purpose: Recover structured readings from authenticated ciphertext.
// Dependencies: aes, cbc, serde_json, crate::envelope::codec
// ============================================================================

//! ## Overview
//! Decrypts envelope ciphertext with the fleet-shared key and IV, strips
//! PKCS7 padding, and parses the plaintext into a [`TelemetryReading`].
//! Decryption failures are distinguished from malformed telemetry so the
//! pipeline can report which stage rejected an already-persisted envelope.
//! Callers must verify the envelope tag first; this module assumes
//! authenticated input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use aes::Aes128;
use aes::cipher::BlockDecryptMut;
use aes::cipher::KeyIvInit;
use aes::cipher::block_padding::NoPadding;
use thiserror::Error;

use crate::core::telemetry::TelemetryReading;
use crate::envelope::EnvelopeKeys;
use crate::envelope::codec;
use crate::envelope::codec::BLOCK_SIZE;
use crate::envelope::codec::Utf8Mode;

// ============================================================================
// SECTION: Types
// ============================================================================

/// AES-128-CBC decryptor instantiation.
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Decryption and interpretation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never embed ciphertext, plaintext, or key material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecryptError {
    /// Ciphertext could not be decrypted or unpadded.
    #[error("decryption failure: {0}")]
    Decryption(String),
    /// Decrypted bytes are not a valid structured reading.
    #[error("malformed telemetry: {0}")]
    MalformedTelemetry(String),
}

// ============================================================================
// SECTION: Decryption
// ============================================================================

/// Decrypts envelope ciphertext and strips PKCS7 padding.
///
/// # Errors
///
/// Returns [`DecryptError::Decryption`] when the ciphertext length is not a
/// positive multiple of the block size or unpadding fails.
pub fn decrypt(ciphertext: &[u8], keys: &EnvelopeKeys) -> Result<Vec<u8>, DecryptError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(DecryptError::Decryption(format!(
            "ciphertext length {} is not a positive multiple of the block size",
            ciphertext.len()
        )));
    }
    let decryptor = Aes128CbcDec::new_from_slices(keys.aes_key(), keys.aes_iv())
        .map_err(|_| DecryptError::Decryption("invalid key or iv length".to_string()))?;
    let mut buffer = ciphertext.to_vec();
    let plaintext = decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| DecryptError::Decryption("block decryption failed".to_string()))?;
    let unpadded = codec::pkcs7_unpad(plaintext)
        .map_err(|err| DecryptError::Decryption(err.to_string()))?;
    Ok(unpadded.to_vec())
}

/// Parses decrypted plaintext into a structured reading.
///
/// Trailing NUL bytes are tolerated; legacy firmware zero-pads short strings.
///
/// # Errors
///
/// Returns [`DecryptError::MalformedTelemetry`] when the plaintext is not
/// valid UTF-8 or not a structurally complete reading.
pub fn parse_reading(plaintext: &[u8]) -> Result<TelemetryReading, DecryptError> {
    let text = codec::utf8_decode(plaintext, Utf8Mode::Tolerant)
        .map_err(|err| DecryptError::MalformedTelemetry(err.to_string()))?;
    serde_json::from_str(&text).map_err(|err| DecryptError::MalformedTelemetry(err.to_string()))
}

/// Decrypts ciphertext and parses the result in one step.
///
/// # Errors
///
/// Returns [`DecryptError`] from whichever stage rejects the input.
pub fn decrypt_reading(
    ciphertext: &[u8],
    keys: &EnvelopeKeys,
) -> Result<TelemetryReading, DecryptError> {
    let plaintext = decrypt(ciphertext, keys)?;
    parse_reading(&plaintext)
}
