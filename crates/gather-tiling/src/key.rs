//! Dispatch key encoding.
//!
//! Layout: `base(mode) + variant * 1000 + width_class * 10 + flag_bits`, with
//! mode bases spaced `1_000_000_000` apart so modes never share a range.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::PlanContext;
use crate::dtype::{is_access_width, width_class};
use crate::mode::{ModeSelection, TilingMode};

const MODE_STRIDE: u64 = 1_000_000_000;
const VARIANT_STRIDE: u64 = 1000;
const WIDTH_STRIDE: u64 = 10;

const FLAG_NEGATIVE_INDEX: u64 = 1;
const FLAG_WIDE_ADDRESS: u64 = 2;

const fn mode_base(mode: TilingMode) -> u64 {
    let slot = match mode {
        TilingMode::SimtGeneric => 1,
        TilingMode::SimdGeneric => 2,
        TilingMode::TwoDimSimt => 3,
        TilingMode::TwoDimSimd => 4,
        TilingMode::GatherAxisFullLoad => 5,
        TilingMode::LastAxisGatherCache => 6,
        TilingMode::FullAxisLoad => 7,
        TilingMode::EmptyAxis => 8,
    };
    slot * MODE_STRIDE
}

/// Feature flags carried in the key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyFlags {
    pub negative_index: bool,
    /// Offsets need 64-bit arithmetic.
    pub wide_address: bool,
    /// Gathered table is materialized before replication.
    pub materialized: bool,
}

impl KeyFlags {
    const fn bits(self) -> u64 {
        let mut bits = 0;
        if self.negative_index {
            bits |= FLAG_NEGATIVE_INDEX;
        }
        if self.wide_address {
            bits |= FLAG_WIDE_ADDRESS;
        }
        bits
    }

    const fn variant(self) -> u64 {
        if self.materialized { 1 } else { 0 }
    }
}

/// Opaque kernel-variant token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TilingKey(u64);

/// Fields recovered from a [`TilingKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedKey {
    pub mode: TilingMode,
    pub width: i32,
    pub flags: KeyFlags,
}

impl TilingKey {
    /// Encode a key. `width` must be an access width (1, 2, 4 or 8); any
    /// other value falls into the 8-byte class.
    #[must_use]
    pub const fn encode(mode: TilingMode, width: i32, flags: KeyFlags) -> Self {
        Self(
            mode_base(mode)
                + flags.variant() * VARIANT_STRIDE
                + width_class(width) * WIDTH_STRIDE
                + flags.bits(),
        )
    }

    /// Key for a selection, deriving the flags from the shape.
    #[must_use]
    pub fn for_selection(ctx: &PlanContext<'_>, selection: &ModeSelection) -> Self {
        let flags = KeyFlags {
            negative_index: ctx.facts().negative_index_support(),
            wide_address: selection.mode.uses_i32_offsets() && ctx.needs_wide_address(),
            materialized: selection.materializes_table(),
        };
        Self::encode(selection.mode, ctx.effective_width() as i32, flags)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Invert [`TilingKey::encode`]. `None` for values outside the key space.
    #[must_use]
    pub fn decode(self) -> Option<DecodedKey> {
        let slot = self.0 / MODE_STRIDE;
        let rest = self.0 % MODE_STRIDE;
        let mode = TilingMode::ALL.into_iter().find(|m| mode_base(*m) == slot * MODE_STRIDE)?;

        let variant = rest / VARIANT_STRIDE;
        let class = (rest % VARIANT_STRIDE) / WIDTH_STRIDE;
        let bits = rest % WIDTH_STRIDE;
        if variant > 1 || class > 3 || bits > (FLAG_NEGATIVE_INDEX | FLAG_WIDE_ADDRESS) {
            return None;
        }
        let width = 1i32 << class;
        debug_assert!(is_access_width(width));
        Some(DecodedKey {
            mode,
            width,
            flags: KeyFlags {
                negative_index: bits & FLAG_NEGATIVE_INDEX != 0,
                wide_address: bits & FLAG_WIDE_ADDRESS != 0,
                materialized: variant == 1,
            },
        })
    }
}

impl From<TilingKey> for u64 {
    fn from(key: TilingKey) -> Self {
        key.0
    }
}

impl fmt::Display for TilingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn all_flags() -> Vec<KeyFlags> {
        let mut out = Vec::new();
        for negative_index in [false, true] {
            for wide_address in [false, true] {
                for materialized in [false, true] {
                    out.push(KeyFlags { negative_index, wide_address, materialized });
                }
            }
        }
        out
    }

    #[test]
    fn keys_are_injective() {
        let mut seen = HashSet::new();
        for mode in TilingMode::ALL {
            for width in [1, 2, 4, 8] {
                for flags in all_flags() {
                    assert!(seen.insert(TilingKey::encode(mode, width, flags)));
                }
            }
        }
        assert_eq!(seen.len(), 8 * 4 * 8);
    }

    #[test]
    fn decode_inverts_encode() {
        for mode in TilingMode::ALL {
            for width in [1, 2, 4, 8] {
                for flags in all_flags() {
                    let decoded = TilingKey::encode(mode, width, flags).decode().unwrap();
                    assert_eq!(decoded, DecodedKey { mode, width, flags });
                }
            }
        }
    }

    #[test]
    fn known_values() {
        let key = TilingKey::encode(TilingMode::SimtGeneric, 4, KeyFlags::default());
        assert_eq!(key.value(), 1_000_000_020);
        let flags = KeyFlags { negative_index: true, wide_address: true, materialized: true };
        let key = TilingKey::encode(TilingMode::GatherAxisFullLoad, 8, flags);
        assert_eq!(key.value(), 5_000_001_033);
    }

    #[test]
    fn decode_rejects_foreign_values() {
        assert!(TilingKey(42).decode().is_none());
        assert!(TilingKey(9_000_000_000).decode().is_none());
        assert!(TilingKey(1_000_000_007).decode().is_none());
    }
}
