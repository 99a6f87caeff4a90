// crates/growthwire-core/src/envelope/codec.rs
// ============================================================================
// Module: Envelope Codec
// Description: Hex conversion, PKCS7 padding, and tolerant UTF-8 decoding.
// Purpose: Convert wire forms produced by constrained device firmware.
// Dependencies: hex, thiserror
// ============================================================================

//! ## Overview
//! Low-level byte conversions for the envelope protocol. All inputs come from
//! unreliable microcontrollers and must be treated as adversarial: every
//! function here rejects malformed input with a typed error and never panics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Cipher block size in bytes (AES).
pub const BLOCK_SIZE: usize = 16;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Codec errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never embed raw payload bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input is not valid for the requested conversion.
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// PKCS7 padding is absent or inconsistent.
    #[error("padding error: {0}")]
    Padding(String),
    /// Bytes are not a valid UTF-8 sequence.
    #[error("encoding error: {0}")]
    Encoding(String),
}

// ============================================================================
// SECTION: Hex
// ============================================================================

/// Decodes a hex string into bytes.
///
/// # Errors
///
/// Returns [`CodecError::MalformedInput`] when the input has odd length or
/// contains a non-hex character.
pub fn hex_decode(input: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(input).map_err(|err| CodecError::MalformedInput(err.to_string()))
}

/// Encodes bytes as a lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

// ============================================================================
// SECTION: PKCS7 Padding
// ============================================================================

/// Pads data to a whole number of cipher blocks.
///
/// The pad length is stored in every padding byte; input already aligned to
/// the block size gains a full block of padding.
#[must_use]
pub fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(data.len() + pad);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad, u8::try_from(pad).unwrap_or(u8::MAX));
    padded
}

/// Strips PKCS7 padding, returning the unpadded prefix.
///
/// The final byte is read as the pad length N and the last N bytes are
/// removed. Adversarial pad bytes are rejected, never panicked on.
///
/// # Errors
///
/// Returns [`CodecError::Padding`] when the input is empty, the pad length is
/// zero, exceeds the block size, or exceeds the total length.
pub fn pkcs7_unpad(data: &[u8]) -> Result<&[u8], CodecError> {
    let Some(&last) = data.last() else {
        return Err(CodecError::Padding("empty input".to_string()));
    };
    let pad = usize::from(last);
    if pad == 0 {
        return Err(CodecError::Padding("pad length is zero".to_string()));
    }
    if pad > BLOCK_SIZE {
        return Err(CodecError::Padding(format!("pad length {pad} exceeds block size")));
    }
    if pad > data.len() {
        return Err(CodecError::Padding(format!("pad length {pad} exceeds input length")));
    }
    data.get(.. data.len() - pad)
        .ok_or_else(|| CodecError::Padding("pad length exceeds input length".to_string()))
}

// ============================================================================
// SECTION: UTF-8
// ============================================================================

/// UTF-8 decoding mode.
///
/// # Invariants
/// - `Tolerant` affects trailing NUL bytes only; invalid sequences are
///   rejected in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf8Mode {
    /// Reject any deviation from valid UTF-8.
    Strict,
    /// Strip trailing NUL bytes before decoding. Legacy device firmware pads
    /// short strings with zero bytes instead of PKCS7.
    Tolerant,
}

/// Decodes bytes as UTF-8.
///
/// # Errors
///
/// Returns [`CodecError::Encoding`] when the bytes are not a valid UTF-8
/// sequence after mode-dependent trimming.
pub fn utf8_decode(bytes: &[u8], mode: Utf8Mode) -> Result<String, CodecError> {
    let trimmed = match mode {
        Utf8Mode::Strict => bytes,
        Utf8Mode::Tolerant => {
            let end = bytes.iter().rposition(|&byte| byte != 0).map_or(0, |pos| pos + 1);
            bytes.get(.. end).unwrap_or(bytes)
        }
    };
    String::from_utf8(trimmed.to_vec()).map_err(|err| CodecError::Encoding(err.to_string()))
}
