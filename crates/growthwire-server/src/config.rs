// crates/growthwire-server/src/config.rs
// ============================================================================
// Module: Server Configuration (Re-export)
// Description: Re-export canonical Growthwire config types.
// Purpose: Preserve server public API while centralizing config logic.
// Dependencies: growthwire-config
// ============================================================================

//! ## Overview
//! This module re-exports the canonical configuration model from
//! `growthwire-config` to keep server callers stable while enforcing a single
//! source of truth.

/// Re-export canonical config types and helpers.
pub use growthwire_config::*;
