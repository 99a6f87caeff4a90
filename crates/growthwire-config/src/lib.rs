// crates/growthwire-config/src/lib.rs
// ============================================================================
// Module: Growthwire Configuration
// Description: Canonical configuration model, loading, and validation.
// Purpose: Resolve immutable runtime configuration once at startup.
// Dependencies: growthwire-core, growthwire-store-sqlite, serde, toml, url
// ============================================================================

//! ## Overview
//! The configuration model for the Growthwire server: transport binding,
//! store backend, fleet key material, scorer client limits, and enrichment
//! worker tuning. Secrets resolve once at startup, from the environment when
//! present and the file otherwise, into an immutable [`EnvelopeKeys`] injected
//! into the pipeline at construction; nothing is re-read per request.
//! Validation pinpoints the offending field and fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use growthwire_core::EnvelopeKeys;
use growthwire_core::IV_LENGTH;
use growthwire_core::KEY_LENGTH;
use growthwire_core::envelope::codec;
use growthwire_store_sqlite::SqliteStoreMode;
use growthwire_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable overriding the AES key.
pub const AES_KEY_ENV: &str = "GROWTHWIRE_AES_KEY";
/// Environment variable overriding the AES IV.
pub const AES_IV_ENV: &str = "GROWTHWIRE_AES_IV";
/// Environment variable overriding the HMAC key.
pub const HMAC_KEY_ENV: &str = "GROWTHWIRE_HMAC_KEY";

/// Default HTTP bind address.
const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default maximum request body size in bytes.
const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;
/// Default scorer timeout in milliseconds.
const DEFAULT_SCORER_TIMEOUT_MS: u64 = 5_000;
/// Default maximum scorer response size in bytes.
const DEFAULT_SCORER_MAX_RESPONSE_BYTES: usize = 64 * 1024;
/// Default scorer user agent.
const DEFAULT_SCORER_USER_AGENT: &str = "growthwire/0.1";
/// Default enrichment queue capacity.
const DEFAULT_QUEUE_CAPACITY: usize = 256;
/// Default enrichment attempt budget per job.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default backoff between enrichment attempts in milliseconds.
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
/// Default store busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages name the offending field but never embed secret values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A field value is invalid.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Model
// ============================================================================

/// Canonical Growthwire configuration.
///
/// # Invariants
/// - `validate` must pass before the configuration is used to build a server.
#[derive(Debug, Clone, Deserialize)]
pub struct GrowthwireConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Store backend settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Fleet key material.
    #[serde(default)]
    pub keys: KeysConfig,
    /// External scorer client settings.
    pub scorer: ScorerConfig,
    /// Enrichment worker settings.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

/// HTTP server settings.
///
/// # Invariants
/// - `bind` must parse as a socket address.
/// - `max_body_bytes` must be greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Optional append-only audit log path; stderr is used when absent.
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            audit_log: None,
        }
    }
}

/// Store backend selection.
///
/// # Invariants
/// - Labels are stable configuration values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store, for development and tests.
    #[default]
    Memory,
    /// Durable `SQLite` store.
    Sqlite,
}

/// Store backend settings.
///
/// # Invariants
/// - `path` is required when `store_type` is `sqlite`.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// Database file path for the `SQLite` backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds for the `SQLite` backend.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::Memory,
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Fleet key material, hex-encoded.
///
/// Environment variables take precedence over file values so deployments can
/// keep secrets out of the configuration file entirely.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysConfig {
    /// Hex-encoded AES-128 key.
    #[serde(default)]
    pub aes_key_hex: Option<String>,
    /// Hex-encoded AES IV.
    #[serde(default)]
    pub aes_iv_hex: Option<String>,
    /// Hex-encoded HMAC key.
    #[serde(default)]
    pub hmac_key_hex: Option<String>,
}

/// External scorer client settings.
///
/// # Invariants
/// - `endpoint` must be an absolute `https` URL (`http` only with
///   `allow_http`).
/// - `timeout_ms` and `max_response_bytes` must be greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct ScorerConfig {
    /// Full URL of the scorer endpoint.
    pub endpoint: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_scorer_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    #[serde(default = "default_scorer_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Allow cleartext HTTP (disabled by default).
    #[serde(default)]
    pub allow_http: bool,
    /// User agent string for outbound requests.
    #[serde(default = "default_scorer_user_agent")]
    pub user_agent: String,
}

/// Enrichment worker settings.
///
/// # Invariants
/// - `queue_capacity` and `max_attempts` must be greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Bounded queue capacity between pipeline and worker.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Attempt budget per job, including the first attempt.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff between attempts in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns the default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Returns the default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Returns the default scorer timeout.
const fn default_scorer_timeout_ms() -> u64 {
    DEFAULT_SCORER_TIMEOUT_MS
}

/// Returns the default maximum scorer response size.
const fn default_scorer_max_response_bytes() -> usize {
    DEFAULT_SCORER_MAX_RESPONSE_BYTES
}

/// Returns the default scorer user agent.
fn default_scorer_user_agent() -> String {
    DEFAULT_SCORER_USER_AGENT.to_string()
}

/// Returns the default enrichment queue capacity.
const fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Returns the default enrichment attempt budget.
const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Returns the default enrichment backoff.
const fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

/// Returns the default store busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Loads a configuration from a TOML file.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed.
pub fn load(path: &Path) -> Result<GrowthwireConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    parse(&contents)
}

/// Parses a configuration from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] when the text is not a valid configuration.
pub fn parse(contents: &str) -> Result<GrowthwireConfig, ConfigError> {
    toml::from_str(contents).map_err(|err| ConfigError::Parse(err.to_string()))
}

// ============================================================================
// SECTION: Validation
// ============================================================================

impl GrowthwireConfig {
    /// Validates every field of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "server.bind is not a socket address: {}",
                self.server.bind
            )));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.store.store_type == StoreType::Sqlite && self.store.path.is_none() {
            return Err(ConfigError::Invalid("store.path is required for sqlite".to_string()));
        }
        validate_scorer(&self.scorer)?;
        if self.enrichment.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "enrichment.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.enrichment.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "enrichment.max_attempts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Validates the scorer client settings.
fn validate_scorer(scorer: &ScorerConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&scorer.endpoint).map_err(|_| {
        ConfigError::Invalid(format!("scorer.endpoint is not a url: {}", scorer.endpoint))
    })?;
    match url.scheme() {
        "https" => {}
        "http" if scorer.allow_http => {}
        "http" => {
            return Err(ConfigError::Invalid(
                "scorer.endpoint uses http without allow_http".to_string(),
            ));
        }
        other => {
            return Err(ConfigError::Invalid(format!(
                "scorer.endpoint has unsupported scheme: {other}"
            )));
        }
    }
    if scorer.timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "scorer.timeout_ms must be greater than zero".to_string(),
        ));
    }
    if scorer.max_response_bytes == 0 {
        return Err(ConfigError::Invalid(
            "scorer.max_response_bytes must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Key Resolution
// ============================================================================

impl KeysConfig {
    /// Resolves key material from the process environment and the file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when any key is missing or has the
    /// wrong width.
    pub fn resolve(&self) -> Result<EnvelopeKeys, ConfigError> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolves key material using the given environment lookup.
    ///
    /// Environment values take precedence over file values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when any key is missing or has the
    /// wrong width.
    pub fn resolve_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<EnvelopeKeys, ConfigError> {
        let aes_key = decode_key(
            "keys.aes_key_hex",
            lookup(AES_KEY_ENV).as_deref().or(self.aes_key_hex.as_deref()),
            Some(KEY_LENGTH),
        )?;
        let aes_iv = decode_key(
            "keys.aes_iv_hex",
            lookup(AES_IV_ENV).as_deref().or(self.aes_iv_hex.as_deref()),
            Some(IV_LENGTH),
        )?;
        let hmac_key = decode_key(
            "keys.hmac_key_hex",
            lookup(HMAC_KEY_ENV).as_deref().or(self.hmac_key_hex.as_deref()),
            None,
        )?;
        let aes_key: [u8; KEY_LENGTH] = aes_key
            .try_into()
            .map_err(|_| ConfigError::Invalid("keys.aes_key_hex has the wrong width".to_string()))?;
        let aes_iv: [u8; IV_LENGTH] = aes_iv
            .try_into()
            .map_err(|_| ConfigError::Invalid("keys.aes_iv_hex has the wrong width".to_string()))?;
        Ok(EnvelopeKeys::new(aes_key, aes_iv, hmac_key))
    }
}

/// Decodes one hex-encoded key, enforcing an exact width when given.
fn decode_key(
    field: &str,
    value: Option<&str>,
    expected_length: Option<usize>,
) -> Result<Vec<u8>, ConfigError> {
    let value = value
        .ok_or_else(|| ConfigError::Invalid(format!("{field} is missing (file or environment)")))?;
    let bytes = codec::hex_decode(value)
        .map_err(|_| ConfigError::Invalid(format!("{field} is not valid hex")))?;
    match expected_length {
        Some(expected) if bytes.len() != expected => Err(ConfigError::Invalid(format!(
            "{field} must be {expected} bytes, got {}",
            bytes.len()
        ))),
        _ if bytes.is_empty() => {
            Err(ConfigError::Invalid(format!("{field} must not be empty")))
        }
        _ => Ok(bytes),
    }
}
