// crates/growthwire-core/tests/proptest_envelope.rs
// ============================================================================
// Module: Envelope Property-Based Tests
// Description: Property tests for verification and padding invariants.
// Purpose: Detect panics and invariant violations across wide input ranges.
// ============================================================================

//! Property-based tests for envelope verification and PKCS7 invariants.

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

use growthwire_core::envelope::codec::pkcs7_pad;
use growthwire_core::envelope::codec::pkcs7_unpad;
use growthwire_core::envelope::verifier::compute_tag;
use growthwire_core::envelope::verifier::verify;
use proptest::prelude::*;

proptest! {
    #[test]
    fn verify_accepts_own_tag(
        payload in prop::collection::vec(any::<u8>(), 0 .. 256),
        key in prop::collection::vec(any::<u8>(), 1 .. 64),
    ) {
        let tag = compute_tag(&payload, &key);
        prop_assert!(verify(&payload, &tag, &key));
    }

    #[test]
    fn verify_rejects_payload_bit_flip(
        payload in prop::collection::vec(any::<u8>(), 1 .. 256),
        key in prop::collection::vec(any::<u8>(), 1 .. 64),
        index in any::<prop::sample::Index>(),
        bit in 0_u8 .. 8,
    ) {
        let tag = compute_tag(&payload, &key);
        let mut flipped = payload.clone();
        let position = index.index(flipped.len());
        flipped[position] ^= 1 << bit;
        prop_assert!(!verify(&flipped, &tag, &key));
    }

    #[test]
    fn verify_rejects_tag_bit_flip(
        payload in prop::collection::vec(any::<u8>(), 0 .. 256),
        key in prop::collection::vec(any::<u8>(), 1 .. 64),
        index in any::<prop::sample::Index>(),
        bit in 0_u8 .. 8,
    ) {
        let mut tag = compute_tag(&payload, &key);
        let position = index.index(tag.len());
        tag[position] ^= 1 << bit;
        prop_assert!(!verify(&payload, &tag, &key));
    }

    #[test]
    fn verify_rejects_truncated_tag(
        payload in prop::collection::vec(any::<u8>(), 0 .. 256),
        key in prop::collection::vec(any::<u8>(), 1 .. 64),
        cut in 1_usize .. 32,
    ) {
        let tag = compute_tag(&payload, &key);
        prop_assert!(!verify(&payload, &tag[.. tag.len() - cut], &key));
    }

    #[test]
    fn pkcs7_round_trips(data in prop::collection::vec(any::<u8>(), 0 .. 64)) {
        let padded = pkcs7_pad(&data);
        prop_assert_eq!(pkcs7_unpad(&padded).unwrap(), data.as_slice());
    }

    #[test]
    fn pkcs7_unpad_never_panics(data in prop::collection::vec(any::<u8>(), 0 .. 64)) {
        // Either verdict is acceptable; reaching one without panicking is the
        // property.
        let _ = pkcs7_unpad(&data);
    }
}
