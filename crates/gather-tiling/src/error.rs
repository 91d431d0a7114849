//! Error types for gather tiling.

use crate::mode::TilingMode;

/// Result type for planning operations.
pub type TilingResult<T> = Result<T, TilingError>;

/// Malformed or out-of-range shape, axis or batch-dims input.
///
/// Always the caller's fault; the planner never retries on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("axis {axis} out of range [-{rank}, {rank})")]
    AxisOutOfRange { axis: i64, rank: usize },

    #[error("batch_dims {batch_dims} out of range [-{index_rank}, {index_rank}]")]
    BatchDimsOutOfRange { batch_dims: i64, index_rank: usize },

    #[error("batch_dims {batch_dims} must not exceed axis {axis}")]
    BatchDimsExceedAxis { batch_dims: usize, axis: usize },

    #[error("batch dimension {dim} differs: x has {x_size}, indices has {index_size}")]
    BatchDimMismatch { dim: usize, x_size: i64, index_size: i64 },

    #[error("{tensor} dimension {dim} is negative ({value})")]
    NegativeDimension { tensor: &'static str, dim: usize, value: i64 },

    #[error("{quantity} must be at least {min}, got {value}")]
    ScalarOutOfRange { quantity: &'static str, value: i64, min: i64 },

    #[error("{quantity} overflows the signed 64-bit range")]
    Overflow { quantity: &'static str },

    #[error("unsupported element width {width} bytes (expected 1, 2, 4 or 8)")]
    UnsupportedElementWidth { width: i32 },

    #[error("shape is not supported by {mode}: {reason}")]
    UnsupportedByMode { mode: TilingMode, reason: &'static str },
}

/// The scratch budget cannot hold the minimum buffers of a mode.
///
/// Recoverable at a higher layer by choosing a less specialized mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{mode} needs {required} scratch bytes for {buffer}, only {available} available")]
pub struct CapacityError {
    pub mode: TilingMode,
    pub buffer: &'static str,
    pub required: i64,
    pub available: i64,
}

/// Every failure the planner can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TilingError {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Capacity(#[from] CapacityError),
}

impl TilingError {
    /// Capacity failures may succeed with a different mode; shape failures
    /// never will.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Capacity(_))
    }

    /// The capacity failure, if this is one.
    #[must_use]
    pub const fn as_capacity(&self) -> Option<&CapacityError> {
        match self {
            Self::Capacity(err) => Some(err),
            Self::Shape(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_error_message_carries_sizes() {
        let err = CapacityError {
            mode: TilingMode::SimtGeneric,
            buffer: "output staging",
            required: 1024,
            available: 96,
        };
        let msg = err.to_string();
        assert!(msg.contains("1024"), "{msg}");
        assert!(msg.contains("96"), "{msg}");
        assert!(msg.contains("output staging"), "{msg}");
    }

    #[test]
    fn shape_errors_are_not_recoverable() {
        let err: TilingError = ShapeError::AxisOutOfRange { axis: 5, rank: 2 }.into();
        assert!(!err.is_recoverable());
        assert!(err.as_capacity().is_none());
        assert_eq!(err.to_string(), "axis 5 out of range [-2, 2)");
    }

    #[test]
    fn capacity_errors_are_recoverable() {
        let err: TilingError = CapacityError {
            mode: TilingMode::TwoDimSimd,
            buffer: "index buffer",
            required: 2048,
            available: 0,
        }
        .into();
        assert!(err.is_recoverable());
        assert_eq!(err.as_capacity().map(|c| c.required), Some(2048));
    }
}
