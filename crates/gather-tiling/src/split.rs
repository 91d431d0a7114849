//! Work partitioning across execution units.
//!
//! Integer helpers shared by every sizer: ceiling division, alignment
//! rounding, the even split with a short last unit, and the lane-count
//! shrink used by the SIMT paths.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Integer helpers
// ---------------------------------------------------------------------------

/// Ceiling division for non-negative `value` and positive `divisor`.
#[inline]
#[must_use]
pub const fn ceil_div(value: i64, divisor: i64) -> i64 {
    if divisor <= 0 {
        return value;
    }
    let q = value / divisor;
    if value % divisor == 0 { q } else { q + 1 }
}

/// Round `value` up to the next multiple of `multiple`.
#[inline]
#[must_use]
pub const fn align_up(value: i64, multiple: i64) -> i64 {
    if multiple <= 1 {
        return value;
    }
    let remainder = value % multiple;
    if remainder == 0 { value } else { value.saturating_add(multiple - remainder) }
}

/// Round `value` down to a multiple of `multiple`.
#[inline]
#[must_use]
pub const fn align_down(value: i64, multiple: i64) -> i64 {
    if multiple <= 1 {
        return value;
    }
    value - value % multiple
}

// ---------------------------------------------------------------------------
// Work split
// ---------------------------------------------------------------------------

/// How a mode's total work is spread over the execution units.
///
/// `per_unit * (units_used - 1) + last_unit == total` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkSplit {
    /// Total work in the mode's own unit (rows, elements, tiles or bytes).
    pub total: i64,
    /// Execution units that receive work.
    pub units_used: i64,
    /// Work assigned to every unit but the last.
    pub per_unit: i64,
    /// Work assigned to the last unit.
    pub last_unit: i64,
}

impl WorkSplit {
    /// Reconstructed total, used to check conservation.
    #[must_use]
    pub const fn covered(&self) -> i64 {
        self.per_unit * (self.units_used - 1) + self.last_unit
    }
}

/// Even split with remainder: `per = ceil(total / units)`,
/// `used = ceil(total / per)`, the last unit takes what is left.
///
/// An empty workload still occupies one unit with zero work.
#[must_use]
pub fn even_split(total: i64, units: i64) -> WorkSplit {
    even_split_granular(total, units, 1)
}

/// Even split whose per-unit share is rounded up to whole `granule`s.
///
/// Used where a unit must own complete alignment blocks or lane sweeps.
#[must_use]
pub fn even_split_granular(total: i64, units: i64, granule: i64) -> WorkSplit {
    if total <= 0 {
        return WorkSplit { total: 0, units_used: 1, per_unit: 0, last_unit: 0 };
    }
    let units = units.max(1);
    let per_unit = align_up(ceil_div(total, units), granule.max(1));
    let units_used = ceil_div(total, per_unit);
    let last_unit = total - per_unit * (units_used - 1);
    WorkSplit { total, units_used, per_unit, last_unit }
}

// ---------------------------------------------------------------------------
// Lane shrink
// ---------------------------------------------------------------------------

/// Pick a lane count for SIMT kernels.
///
/// Starts at `max_lanes` and halves while the lane count stays at or above
/// `min_lanes` and the number of lane blocks covering `total` is still below
/// half of `units`.
#[must_use]
pub fn shrink_lanes(total: i64, units: i64, max_lanes: i64, min_lanes: i64) -> i64 {
    let mut lanes = max_lanes.max(1);
    let half_units = units / 2;
    while lanes >= 2 * min_lanes && ceil_div(total.max(0), lanes) < half_units {
        lanes /= 2;
    }
    lanes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_div_rounds_up() {
        assert_eq!(ceil_div(0, 4), 0);
        assert_eq!(ceil_div(1, 4), 1);
        assert_eq!(ceil_div(8, 4), 2);
        assert_eq!(ceil_div(9, 4), 3);
    }

    #[test]
    fn align_helpers() {
        assert_eq!(align_up(0, 32), 0);
        assert_eq!(align_up(1, 32), 32);
        assert_eq!(align_up(64, 32), 64);
        assert_eq!(align_down(63, 32), 32);
        assert_eq!(align_down(31, 32), 0);
        assert_eq!(align_up(7, 1), 7);
    }

    #[test]
    fn even_split_with_remainder() {
        let s = even_split(100, 8);
        assert_eq!(s.per_unit, 13);
        assert_eq!(s.units_used, 8);
        assert_eq!(s.last_unit, 9);
        assert_eq!(s.covered(), 100);
    }

    #[test]
    fn even_split_fewer_items_than_units() {
        let s = even_split(3, 48);
        assert_eq!(s.per_unit, 1);
        assert_eq!(s.units_used, 3);
        assert_eq!(s.last_unit, 1);
    }

    #[test]
    fn even_split_empty_uses_one_unit() {
        let s = even_split(0, 48);
        assert_eq!(s, WorkSplit { total: 0, units_used: 1, per_unit: 0, last_unit: 0 });
        assert_eq!(s.covered(), 0);
    }

    #[test]
    fn granular_split_can_leave_units_idle() {
        // 100 items over 48 units in granules of 32 -> 4 units.
        let s = even_split_granular(100, 48, 32);
        assert_eq!(s.per_unit, 32);
        assert_eq!(s.units_used, 4);
        assert_eq!(s.last_unit, 4);
        assert_eq!(s.covered(), 100);
    }

    #[test]
    fn shrink_lanes_keeps_max_for_large_inputs() {
        assert_eq!(shrink_lanes(1 << 24, 48, 2048, 128), 2048);
    }

    #[test]
    fn shrink_lanes_stops_at_floor() {
        assert_eq!(shrink_lanes(10, 48, 2048, 128), 128);
    }

    #[test]
    fn shrink_lanes_stops_once_half_the_units_are_busy() {
        // 24 blocks are needed to busy half of 48 units: 24 * 1024 = 24576.
        assert_eq!(shrink_lanes(24 * 1024, 48, 2048, 128), 1024);
    }
}
