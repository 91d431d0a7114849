//! Element types and access-width selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element type of the tensor being gathered.
///
/// Only the byte width matters to the planner; values are never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    F16,
    Bf16,
    I32,
    U32,
    F32,
    I64,
    U64,
    F64,
}

impl DataType {
    /// Size of one element in bytes.
    #[must_use]
    pub const fn byte_width(self) -> i32 {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 | Self::F16 | Self::Bf16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::F16 => "f16",
            Self::Bf16 => "bf16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::F32 => "f32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bool" => Ok(Self::Bool),
            "i8" | "int8" => Ok(Self::I8),
            "u8" | "uint8" => Ok(Self::U8),
            "i16" | "int16" => Ok(Self::I16),
            "u16" | "uint16" => Ok(Self::U16),
            "f16" | "float16" | "half" => Ok(Self::F16),
            "bf16" | "bfloat16" => Ok(Self::Bf16),
            "i32" | "int32" => Ok(Self::I32),
            "u32" | "uint32" => Ok(Self::U32),
            "f32" | "float32" | "float" => Ok(Self::F32),
            "i64" | "int64" => Ok(Self::I64),
            "u64" | "uint64" => Ok(Self::U64),
            "f64" | "float64" | "double" => Ok(Self::F64),
            other => Err(format!("unknown data type: {other}")),
        }
    }
}

/// Element type of the index tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    #[default]
    I32,
    I64,
}

impl IndexType {
    /// Size of one index in bytes.
    #[must_use]
    pub const fn byte_width(self) -> i32 {
        match self {
            Self::I32 => 4,
            Self::I64 => 8,
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32 => f.write_str("i32"),
            Self::I64 => f.write_str("i64"),
        }
    }
}

impl FromStr for IndexType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "i32" | "int32" => Ok(Self::I32),
            "i64" | "int64" => Ok(Self::I64),
            other => Err(format!("unknown index type: {other}")),
        }
    }
}

/// Byte widths an element access may use.
pub const ACCESS_WIDTHS: [i32; 4] = [1, 2, 4, 8];

/// Candidates tried when widening an access.
const WIDER_CANDIDATES: [i32; 3] = [2, 4, 8];

/// Whether `width` is one of the supported access widths.
#[must_use]
pub const fn is_access_width(width: i32) -> bool {
    matches!(width, 1 | 2 | 4 | 8)
}

/// Index of `width` within [`ACCESS_WIDTHS`]; this is the width class the
/// dispatch key carries.
#[must_use]
pub const fn width_class(width: i32) -> u64 {
    match width {
        1 => 0,
        2 => 1,
        4 => 2,
        _ => 3,
    }
}

/// Widest access that regroups whole elements without crossing the end of
/// the trailing run.
///
/// Picks the largest `w` in {2, 4, 8} with `w > element_width` and
/// `(inner_size * element_width) % w == 0`; otherwise keeps
/// `element_width`. Output values are unaffected.
#[must_use]
pub fn improve_width(inner_size: i64, element_width: i32) -> i32 {
    let row_bytes = inner_size.saturating_mul(i64::from(element_width));
    WIDER_CANDIDATES
        .iter()
        .rev()
        .copied()
        .find(|&w| w > element_width && row_bytes % i64::from(w) == 0)
        .unwrap_or(element_width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_widths() {
        assert_eq!(DataType::Bool.byte_width(), 1);
        assert_eq!(DataType::Bf16.byte_width(), 2);
        assert_eq!(DataType::F32.byte_width(), 4);
        assert_eq!(DataType::U64.byte_width(), 8);
        assert_eq!(IndexType::I64.byte_width(), 8);
    }

    #[test]
    fn parse_aliases() {
        assert_eq!("float16".parse::<DataType>().unwrap(), DataType::F16);
        assert_eq!("F32".parse::<DataType>().unwrap(), DataType::F32);
        assert_eq!("int64".parse::<IndexType>().unwrap(), IndexType::I64);
        assert!("f128".parse::<DataType>().is_err());
    }

    #[test]
    fn eight_bytes_pack_into_one_access() {
        assert_eq!(improve_width(8, 1), 8);
    }

    #[test]
    fn partial_packing() {
        // 6 bytes: divisible by 2 only.
        assert_eq!(improve_width(6, 1), 2);
        // 12 bytes of f16: divisible by 4 but not 8.
        assert_eq!(improve_width(6, 2), 4);
    }

    #[test]
    fn no_candidate_keeps_width() {
        assert_eq!(improve_width(1, 4), 4);
        assert_eq!(improve_width(3, 1), 1);
        assert_eq!(improve_width(1024, 8), 8);
    }

    #[test]
    fn width_classes_are_distinct() {
        let classes: Vec<u64> = ACCESS_WIDTHS.iter().map(|&w| width_class(w)).collect();
        assert_eq!(classes, vec![0, 1, 2, 3]);
    }
}
