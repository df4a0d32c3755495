// 📏 Size Estimates - field size classes as numbers
// Field crews record "1".."4" or a range like "2-3" when unsure.
// Ranges become halves, anything unexpected becomes 0 (unsized, not size zero).

use crate::ledger::SightingPayload;
use serde::{Deserialize, Serialize};

/// Largest size class in the growth model
pub const MAX_SIZE_CLASS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct SizeEstimate(pub f64);

impl SizeEstimate {
    pub const UNSIZED: SizeEstimate = SizeEstimate(0.0);

    /// Decode the estimated size column of a capture record
    pub fn parse(raw: Option<&str>) -> Self {
        let value = match raw.map(str::trim) {
            Some("1") => 1.0,
            Some("2") => 2.0,
            Some("3") => 3.0,
            Some("4") => 4.0,
            Some("1-2") => 1.5,
            Some("2-3") => 2.5,
            Some("3-4") => 3.5,
            _ => 0.0,
        };
        SizeEstimate(value)
    }

    pub fn from_class(class: u8) -> Self {
        SizeEstimate(f64::from(class))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_sized(self) -> bool {
        self.0 != 0.0
    }

    /// Integral class 0..=4, or None for a fractional/out-of-range value
    pub fn class(self) -> Option<u8> {
        let v = self.0;
        if v.fract() == 0.0 && (0.0..=f64::from(MAX_SIZE_CLASS)).contains(&v) {
            Some(v as u8)
        } else {
            None
        }
    }
}

impl SightingPayload for SizeEstimate {
    /// Pairwise: zero never overwrites, a sized value replaces zero,
    /// two sized values average. Three or more same-day sightings
    /// therefore over-weight the later ones.
    fn merge_same_day(&mut self, later: Self) {
        if !later.is_sized() {
            return;
        }
        if self.is_sized() {
            self.0 = (self.0 + later.0) / 2.0;
        } else {
            self.0 = later.0;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
