// crates/growthwire-core/src/envelope/mod.rs
// ============================================================================
// Module: Growthwire Envelope
// Description: Envelope shapes, protocol versioning, and shared key material.
// Purpose: Model the authenticated-then-encrypted unit a device submits.
// Dependencies: base64, serde, crate::envelope submodules
// ============================================================================

//! ## Overview
//! The divergent wire forms observed across the device fleet (plaintext
//! JSON, base64-encoded AES, hex-encoded AES) are protocol version drift, not
//! independent features. This module models them as an [`EnvelopeVersion`]
//! selected by content sniffing; every version shares the same pipeline state
//! machine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::DeviceUid;
use crate::core::telemetry::TelemetryReading;
use crate::envelope::codec::CodecError;

pub mod codec;
pub mod decryptor;
pub mod verifier;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// AES key length in bytes (AES-128, the fleet firmware width).
pub const KEY_LENGTH: usize = 16;

/// AES initialization vector length in bytes.
pub const IV_LENGTH: usize = 16;

// ============================================================================
// SECTION: Key Material
// ============================================================================

/// Immutable envelope key material shared out-of-band with the device fleet.
///
/// Loaded once at startup and injected into the pipeline at construction;
/// never re-read per request. The IV is static across all messages, a known
/// weakness of the deployed protocol that cannot be changed server-side
/// without breaking field devices.
///
/// # Invariants
/// - `aes_key` and `aes_iv` are exactly [`KEY_LENGTH`] / [`IV_LENGTH`] bytes.
#[derive(Clone)]
pub struct EnvelopeKeys {
    /// AES-128 key shared with the fleet.
    aes_key: [u8; KEY_LENGTH],
    /// Static initialization vector shared with the fleet.
    aes_iv: [u8; IV_LENGTH],
    /// HMAC key shared with the fleet.
    hmac_key: Vec<u8>,
}

impl EnvelopeKeys {
    /// Creates envelope key material from fixed-width parts.
    #[must_use]
    pub const fn new(aes_key: [u8; KEY_LENGTH], aes_iv: [u8; IV_LENGTH], hmac_key: Vec<u8>) -> Self {
        Self {
            aes_key,
            aes_iv,
            hmac_key,
        }
    }

    /// Returns the AES key bytes.
    #[must_use]
    pub const fn aes_key(&self) -> &[u8] {
        &self.aes_key
    }

    /// Returns the static IV bytes.
    #[must_use]
    pub const fn aes_iv(&self) -> &[u8] {
        &self.aes_iv
    }

    /// Returns the HMAC key bytes.
    #[must_use]
    pub fn hmac_key(&self) -> &[u8] {
        &self.hmac_key
    }
}

impl std::fmt::Debug for EnvelopeKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material must never reach logs.
        f.debug_struct("EnvelopeKeys").finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Authenticated-then-encrypted unit submitted by a device.
///
/// # Invariants
/// - `hmac` is computed over the exact `payload` string bytes as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Encoded ciphertext string.
    pub payload: String,
    /// Hex-encoded authentication tag.
    pub hmac: String,
}

/// Protocol version of a device submission.
///
/// # Invariants
/// - Labels are stable for audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeVersion {
    /// Plaintext JSON body, no envelope (legacy v1).
    V1Plain,
    /// Base64-encoded AES ciphertext with HMAC tag (v2).
    V2TextAes,
    /// Hex-encoded AES ciphertext with HMAC tag (v3).
    V3HexAes,
}

impl EnvelopeVersion {
    /// Returns a stable label for the version.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1Plain => "plain-v1",
            Self::V2TextAes => "aes-text-v2",
            Self::V3HexAes => "aes-hex-v3",
        }
    }

    /// Sniffs the envelope version from a payload string.
    ///
    /// A payload that decodes as hex is v3; anything else is treated as the
    /// base64 text form.
    #[must_use]
    pub fn sniff(payload: &str) -> Self {
        let looks_hex = !payload.is_empty()
            && payload.len() % 2 == 0
            && payload.bytes().all(|byte| byte.is_ascii_hexdigit());
        if looks_hex { Self::V3HexAes } else { Self::V2TextAes }
    }
}

/// Decodes an envelope payload string into ciphertext bytes.
///
/// # Errors
///
/// Returns [`CodecError::MalformedInput`] when the payload does not decode
/// under the sniffed version, or the version carries no ciphertext.
pub fn decode_ciphertext(payload: &str, version: EnvelopeVersion) -> Result<Vec<u8>, CodecError> {
    match version {
        EnvelopeVersion::V1Plain => {
            Err(CodecError::MalformedInput("plaintext submissions carry no ciphertext".to_string()))
        }
        EnvelopeVersion::V2TextAes => BASE64
            .decode(payload)
            .map_err(|err| CodecError::MalformedInput(err.to_string())),
        EnvelopeVersion::V3HexAes => codec::hex_decode(payload),
    }
}

// ============================================================================
// SECTION: Ingest Body
// ============================================================================

/// Wire body accepted by the ingestion endpoint across protocol versions.
///
/// # Invariants
/// - Field presence decides the protocol version; see [`IngestBody::classify`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestBody {
    /// Encoded ciphertext (envelope versions).
    pub payload: Option<String>,
    /// Hex-encoded authentication tag (envelope versions).
    pub hmac: Option<String>,
    /// Device identifier (plaintext v1).
    pub uid: Option<String>,
    /// Reported age (plaintext v1).
    pub age: Option<u32>,
    /// Reported height (plaintext v1).
    pub height: Option<f64>,
    /// Raw status classification (plaintext v1).
    pub status: Option<String>,
}

/// Classified device submission.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestSubmission {
    /// Legacy plaintext reading.
    Plain(TelemetryReading),
    /// Encrypted envelope with its sniffed version.
    Enveloped {
        /// The submitted envelope.
        envelope: Envelope,
        /// Sniffed protocol version.
        version: EnvelopeVersion,
    },
}

impl IngestBody {
    /// Classifies the body into a protocol version.
    ///
    /// # Errors
    ///
    /// Returns a description of the missing fields when the body matches no
    /// known protocol shape.
    pub fn classify(&self) -> Result<IngestSubmission, String> {
        if let (Some(payload), Some(hmac)) = (&self.payload, &self.hmac) {
            let version = EnvelopeVersion::sniff(payload);
            return Ok(IngestSubmission::Enveloped {
                envelope: Envelope {
                    payload: payload.clone(),
                    hmac: hmac.clone(),
                },
                version,
            });
        }
        match (&self.uid, self.age, self.height, &self.status) {
            (Some(uid), Some(age), Some(height), Some(status)) => {
                Ok(IngestSubmission::Plain(TelemetryReading {
                    uid: DeviceUid::new(uid.clone()),
                    age,
                    height,
                    status: status.clone(),
                }))
            }
            _ => Err("body is neither an envelope nor a complete plaintext reading".to_string()),
        }
    }
}
