// crates/growthwire-core/src/core/time.rs
// ============================================================================
// Module: Growthwire Time Model
// Description: Canonical timestamps and calendar bucketing for stored readings.
// Purpose: Provide caller-supplied time values and the coarse dedup bucket.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Stored readings are ordered by an explicit creation timestamp supplied by
//! the host at ingestion time; the core never reads wall-clock time directly.
//! The calendar month bucket derived from a timestamp is one component of the
//! dedup key used for read-time record selection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp carried on stored status records.
///
/// # Invariants
/// - Unix epoch milliseconds, explicitly provided by callers.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Returns the calendar month bucket containing this timestamp.
    ///
    /// Returns `None` when the timestamp is outside the representable
    /// calendar range.
    #[must_use]
    pub fn month_bucket(self) -> Option<MonthBucket> {
        let datetime = OffsetDateTime::from_unix_timestamp(self.0.div_euclid(1_000)).ok()?;
        Some(MonthBucket {
            year: datetime.year(),
            month: u8::from(datetime.month()),
        })
    }
}

/// Calendar month bucket used as the coarse temporal dedup component.
///
/// # Invariants
/// - `month` is 1-based (January = 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthBucket {
    /// Calendar year.
    pub year: i32,
    /// Calendar month, 1-based.
    pub month: u8,
}
