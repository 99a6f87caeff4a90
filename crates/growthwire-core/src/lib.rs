// crates/growthwire-core/src/lib.rs
// ============================================================================
// Module: Growthwire Core
// Description: Secure telemetry envelope protocol, data model, and pipeline.
// Purpose: Provide the backend-agnostic ingestion core for Growthwire.
// Dependencies: aes, cbc, hmac, sha2, subtle, hex, base64, serde, time
// ============================================================================

//! ## Overview
//! Growthwire Core implements the secure envelope protocol spoken by the
//! device fleet (HMAC-then-decide, AES-CBC, PKCS7), the durable record model,
//! and the ingestion state machine. Backends (store, registry, scorer,
//! enrichment queue) are injected through the [`interfaces`] traits.
//! Security posture: every wire input comes from unreliable microcontrollers
//! and is treated as adversarial.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod envelope;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::core::identifiers::DeviceUid;
pub use self::core::identifiers::ReadingId;
pub use self::core::telemetry::BucketKey;
pub use self::core::telemetry::NewStatusRecord;
pub use self::core::telemetry::PayloadEncoding;
pub use self::core::telemetry::PlainDedupKey;
pub use self::core::telemetry::ReadingView;
pub use self::core::telemetry::StatusRecord;
pub use self::core::telemetry::StoredPayload;
pub use self::core::telemetry::TelemetryReading;
pub use self::core::time::MonthBucket;
pub use self::core::time::Timestamp;
pub use envelope::Envelope;
pub use envelope::EnvelopeKeys;
pub use envelope::EnvelopeVersion;
pub use envelope::IV_LENGTH;
pub use envelope::IngestBody;
pub use envelope::IngestSubmission;
pub use envelope::KEY_LENGTH;
pub use envelope::codec::CodecError;
pub use envelope::decryptor::DecryptError;
pub use interfaces::DeviceRecord;
pub use interfaces::DeviceRegistry;
pub use interfaces::EnqueueError;
pub use interfaces::EnrichmentJob;
pub use interfaces::EnrichmentQueue;
pub use interfaces::InMemoryDeviceRegistry;
pub use interfaces::InMemoryReadingStore;
pub use interfaces::ReadingStore;
pub use interfaces::RecommendationScorer;
pub use interfaces::RegistryError;
pub use interfaces::ScorerError;
pub use interfaces::StoreError;
pub use runtime::pipeline::EnrichmentDisposition;
pub use runtime::pipeline::IngestError;
pub use runtime::pipeline::IngestOutcome;
pub use runtime::pipeline::IngestPipeline;
pub use runtime::pipeline::Interpretation;
pub use runtime::readback::visible_readings;
