// crates/growthwire-config/tests/key_validation.rs
// ============================================================================
// Module: Key Material Resolution Tests
// Description: Environment precedence and key width enforcement.
// Purpose: Validate that secrets resolve once and fail closed on bad widths.
// ============================================================================

//! ## Overview
//! Tests for key material resolution:
//! - File values resolve when the environment is silent
//! - Environment values take precedence over file values
//! - Missing, non-hex, and wrong-width keys are rejected with the field name

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

use std::collections::HashMap;

use growthwire_config::AES_IV_ENV;
use growthwire_config::AES_KEY_ENV;
use growthwire_config::ConfigError;
use growthwire_config::HMAC_KEY_ENV;
use growthwire_config::KeysConfig;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const KEY_HEX: &str = "00112233445566778899aabbccddeeff";
const IV_HEX: &str = "ffeeddccbbaa99887766554433221100";
const HMAC_HEX: &str = "a1b2c3d4";

fn file_keys() -> KeysConfig {
    KeysConfig {
        aes_key_hex: Some(KEY_HEX.to_string()),
        aes_iv_hex: Some(IV_HEX.to_string()),
        hmac_key_hex: Some(HMAC_HEX.to_string()),
    }
}

fn no_env(_name: &str) -> Option<String> {
    None
}

fn assert_invalid_mentions(error: ConfigError, field: &str) {
    match error {
        ConfigError::Invalid(message) => {
            assert!(message.contains(field), "message {message:?} does not mention {field}");
        }
        other => panic!("expected invalid-config error, got {other:?}"),
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

#[test]
fn file_values_resolve_without_environment() {
    let keys = file_keys().resolve_with(no_env).unwrap();
    assert_eq!(keys.aes_key(), &[
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
        0xee, 0xff
    ]);
    assert_eq!(keys.hmac_key(), &[0xa1, 0xb2, 0xc3, 0xd4]);
}

#[test]
fn environment_overrides_file_values() {
    let env: HashMap<&str, &str> = HashMap::from([
        (AES_KEY_ENV, IV_HEX),
        (AES_IV_ENV, KEY_HEX),
        (HMAC_KEY_ENV, "deadbeef"),
    ]);
    let keys = file_keys()
        .resolve_with(|name| env.get(name).map(ToString::to_string))
        .unwrap();
    assert_eq!(keys.hmac_key(), &[0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(keys.aes_key()[0], 0xff);
}

#[test]
fn environment_alone_is_sufficient() {
    let env: HashMap<&str, &str> = HashMap::from([
        (AES_KEY_ENV, KEY_HEX),
        (AES_IV_ENV, IV_HEX),
        (HMAC_KEY_ENV, HMAC_HEX),
    ]);
    let keys = KeysConfig::default()
        .resolve_with(|name| env.get(name).map(ToString::to_string))
        .unwrap();
    assert_eq!(keys.aes_iv()[0], 0xff);
}

// ============================================================================
// SECTION: Rejections
// ============================================================================

#[test]
fn missing_aes_key_is_rejected() {
    let mut keys = file_keys();
    keys.aes_key_hex = None;
    let error = keys.resolve_with(no_env).unwrap_err();
    assert_invalid_mentions(error, "keys.aes_key_hex");
}

#[test]
fn non_hex_key_is_rejected() {
    let mut keys = file_keys();
    keys.hmac_key_hex = Some("not hex".to_string());
    let error = keys.resolve_with(no_env).unwrap_err();
    assert_invalid_mentions(error, "keys.hmac_key_hex");
}

#[test]
fn short_aes_key_is_rejected() {
    let mut keys = file_keys();
    keys.aes_key_hex = Some("0011".to_string());
    let error = keys.resolve_with(no_env).unwrap_err();
    assert_invalid_mentions(error, "keys.aes_key_hex");
}

#[test]
fn wrong_width_iv_is_rejected() {
    let mut keys = file_keys();
    keys.aes_iv_hex = Some(format!("{IV_HEX}00"));
    let error = keys.resolve_with(no_env).unwrap_err();
    assert_invalid_mentions(error, "keys.aes_iv_hex");
}

#[test]
fn empty_hmac_key_is_rejected() {
    let mut keys = file_keys();
    keys.hmac_key_hex = Some(String::new());
    let error = keys.resolve_with(no_env).unwrap_err();
    assert_invalid_mentions(error, "keys.hmac_key_hex");
}
