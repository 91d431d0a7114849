//! Shape normalization.
//!
//! Collapses an N-dimensional gather description into five scalars:
//!
//! ```text
//! x       = [ b0 .. b(batch_dims) | o .. | G | i .. ]
//!             batch_size            outer  ^   inner_size
//!                                          gather axis
//! indices = [ b0 .. b(batch_dims) | s .. ]
//!                                   gather_size
//! ```

use serde::{Deserialize, Serialize};

use crate::dtype::{DataType, IndexType, is_access_width};
use crate::error::ShapeError;

/// Raw description of one gather invocation, as the op front end sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GatherRequest {
    /// Dimensions of the source tensor.
    pub x_shape: Vec<i64>,
    /// Dimensions of the index tensor.
    pub indices_shape: Vec<i64>,
    /// Element type of the source tensor.
    pub x_dtype: DataType,
    /// Element type of the index tensor.
    #[serde(default)]
    pub index_dtype: IndexType,
    /// Gather axis; negative values count from the end.
    pub axis: i64,
    /// Leading dimensions shared by `x` and `indices`; negative values count
    /// from the end of `indices`.
    #[serde(default)]
    pub batch_dims: i64,
    /// Whether indices may be negative (wrapping from the end of the axis).
    #[serde(default)]
    pub negative_index_support: bool,
}

impl GatherRequest {
    /// A request with `batch_dims = 0`, `i32` indices and no negative index
    /// support.
    #[must_use]
    pub fn new(x_shape: Vec<i64>, indices_shape: Vec<i64>, x_dtype: DataType, axis: i64) -> Self {
        Self {
            x_shape,
            indices_shape,
            x_dtype,
            index_dtype: IndexType::I32,
            axis,
            batch_dims: 0,
            negative_index_support: false,
        }
    }

    #[must_use]
    pub fn with_batch_dims(mut self, batch_dims: i64) -> Self {
        self.batch_dims = batch_dims;
        self
    }

    #[must_use]
    pub fn with_index_dtype(mut self, index_dtype: IndexType) -> Self {
        self.index_dtype = index_dtype;
        self
    }

    #[must_use]
    pub fn with_negative_index(mut self, enabled: bool) -> Self {
        self.negative_index_support = enabled;
        self
    }

    /// Shape of the gather output:
    /// `x[..axis] ++ indices[batch_dims..] ++ x[axis + 1..]`.
    pub fn output_shape(&self) -> Result<Vec<i64>, ShapeError> {
        let (axis, batch_dims) = self.resolve_axes()?;
        if self.x_shape.is_empty() {
            return Ok(self.indices_shape[batch_dims..].to_vec());
        }
        let mut out = self.x_shape[..axis].to_vec();
        out.extend_from_slice(&self.indices_shape[batch_dims..]);
        out.extend_from_slice(&self.x_shape[axis + 1..]);
        Ok(out)
    }

    /// Resolve negative `axis` / `batch_dims` and check their ranges.
    fn resolve_axes(&self) -> Result<(usize, usize), ShapeError> {
        let rank = self.x_shape.len();
        let effective_rank = rank.max(1) as i64;
        if self.axis < -effective_rank || self.axis >= effective_rank {
            return Err(ShapeError::AxisOutOfRange { axis: self.axis, rank: rank.max(1) });
        }
        let axis = if self.axis < 0 { self.axis + effective_rank } else { self.axis };
        let axis = axis as usize;

        let index_rank = self.indices_shape.len();
        let signed_index_rank = index_rank as i64;
        if self.batch_dims < -signed_index_rank || self.batch_dims > signed_index_rank {
            return Err(ShapeError::BatchDimsOutOfRange {
                batch_dims: self.batch_dims,
                index_rank,
            });
        }
        let batch_dims = if self.batch_dims < 0 {
            self.batch_dims + signed_index_rank
        } else {
            self.batch_dims
        };
        let batch_dims = batch_dims as usize;
        if batch_dims > axis {
            return Err(ShapeError::BatchDimsExceedAxis { batch_dims, axis });
        }
        Ok((axis, batch_dims))
    }
}

/// The five scalars every later stage works from, plus element widths.
///
/// Built by [`normalize`] or [`ShapeFacts::new`]; both guarantee that the
/// input and output byte sizes fit in `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ShapeFacts {
    batch_size: i64,
    outer_size: i64,
    gather_dim_size: i64,
    gather_size: i64,
    inner_size: i64,
    element_width: i32,
    index_width: i32,
    negative_index_support: bool,
}

impl ShapeFacts {
    /// Build facts from already-collapsed scalars.
    pub fn new(
        batch_size: i64,
        outer_size: i64,
        gather_dim_size: i64,
        gather_size: i64,
        inner_size: i64,
        element_width: i32,
        index_width: i32,
    ) -> Result<Self, ShapeError> {
        check_min("batch_size", batch_size, 1)?;
        check_min("outer_size", outer_size, 1)?;
        check_min("gather_dim_size", gather_dim_size, 0)?;
        check_min("gather_size", gather_size, 0)?;
        check_min("inner_size", inner_size, 1)?;
        if !is_access_width(element_width) {
            return Err(ShapeError::UnsupportedElementWidth { width: element_width });
        }
        if !matches!(index_width, 4 | 8) {
            return Err(ShapeError::UnsupportedElementWidth { width: index_width });
        }

        // A zero axis or index count would hide overflow in the remaining
        // factors, and later stages multiply those factors on their own.
        // Counting zeros as one bounds every sub-product by these totals.
        let width = i64::from(element_width);
        let axis = gather_dim_size.max(1);
        let indices = gather_size.max(1);
        checked_product("input bytes", &[batch_size, outer_size, axis, inner_size, width])?;
        checked_product("output bytes", &[batch_size, outer_size, indices, inner_size, width])?;
        let index_width_bytes = i64::from(index_width);
        checked_product("row index bytes", &[batch_size, outer_size, indices, index_width_bytes])?;

        Ok(Self {
            batch_size,
            outer_size,
            gather_dim_size,
            gather_size,
            inner_size,
            element_width,
            index_width,
            negative_index_support: false,
        })
    }

    #[must_use]
    pub const fn with_negative_index(mut self, enabled: bool) -> Self {
        self.negative_index_support = enabled;
        self
    }

    /// Product of the shared leading batch dimensions.
    #[must_use]
    pub const fn batch_size(&self) -> i64 {
        self.batch_size
    }

    /// Product of the dimensions between the batch dims and the axis.
    #[must_use]
    pub const fn outer_size(&self) -> i64 {
        self.outer_size
    }

    /// Length of the gathered axis.
    #[must_use]
    pub const fn gather_dim_size(&self) -> i64 {
        self.gather_dim_size
    }

    /// Indices per batch.
    #[must_use]
    pub const fn gather_size(&self) -> i64 {
        self.gather_size
    }

    /// Contiguous trailing run length, in elements.
    #[must_use]
    pub const fn inner_size(&self) -> i64 {
        self.inner_size
    }

    #[must_use]
    pub const fn element_width(&self) -> i32 {
        self.element_width
    }

    #[must_use]
    pub const fn index_width(&self) -> i32 {
        self.index_width
    }

    #[must_use]
    pub const fn negative_index_support(&self) -> bool {
        self.negative_index_support
    }

    /// Elements in the source tensor.
    #[must_use]
    pub const fn input_elements(&self) -> i64 {
        self.batch_size * self.outer_size * self.gather_dim_size * self.inner_size
    }

    /// Elements in the output tensor.
    #[must_use]
    pub const fn output_elements(&self) -> i64 {
        self.batch_size * self.outer_size * self.gather_size * self.inner_size
    }

    /// Bytes in the output tensor.
    #[must_use]
    pub const fn output_bytes(&self) -> i64 {
        self.output_elements() * self.element_width as i64
    }
}

/// Collapse a request into [`ShapeFacts`].
///
/// Resolves negative `axis` and `batch_dims`, checks that the shared batch
/// prefix agrees between `x` and `indices`, and rejects negative dimensions
/// and 64-bit overflow. A rank-0 source is treated as a single-element axis.
///
/// Only the gather axis and the index count may be zero. A zero-size batch,
/// outer or trailing dimension is rejected with
/// [`ShapeError::ScalarOutOfRange`]; such a gather has no input rows to read
/// and the caller skips it before planning.
pub fn normalize(request: &GatherRequest) -> Result<ShapeFacts, ShapeError> {
    for (dim, &value) in request.x_shape.iter().enumerate() {
        if value < 0 {
            return Err(ShapeError::NegativeDimension { tensor: "x", dim, value });
        }
    }
    for (dim, &value) in request.indices_shape.iter().enumerate() {
        if value < 0 {
            return Err(ShapeError::NegativeDimension { tensor: "indices", dim, value });
        }
    }

    let (axis, batch_dims) = request.resolve_axes()?;

    for dim in 0..batch_dims {
        let x_size = request.x_shape[dim];
        let index_size = request.indices_shape[dim];
        if x_size != index_size {
            return Err(ShapeError::BatchDimMismatch { dim, x_size, index_size });
        }
    }

    let x = &request.x_shape;
    let (batch_size, outer_size, gather_dim_size, inner_size) = if x.is_empty() {
        (1, 1, 1, 1)
    } else {
        (
            checked_product("batch size", &x[..batch_dims])?,
            checked_product("outer size", &x[batch_dims..axis])?,
            x[axis],
            checked_product("inner size", &x[axis + 1..])?,
        )
    };
    let gather_size = checked_product("gather size", &request.indices_shape[batch_dims..])?;

    let facts = ShapeFacts::new(
        batch_size,
        outer_size,
        gather_dim_size,
        gather_size,
        inner_size,
        request.x_dtype.byte_width(),
        request.index_dtype.byte_width(),
    )?
    .with_negative_index(request.negative_index_support);

    tracing::trace!(
        batch_size,
        outer_size,
        gather_dim_size,
        gather_size,
        inner_size,
        axis,
        batch_dims,
        "normalized gather shape"
    );
    Ok(facts)
}

fn check_min(quantity: &'static str, value: i64, min: i64) -> Result<(), ShapeError> {
    if value < min {
        return Err(ShapeError::ScalarOutOfRange { quantity, value, min });
    }
    Ok(())
}

fn checked_product(quantity: &'static str, dims: &[i64]) -> Result<i64, ShapeError> {
    dims.iter()
        .try_fold(1i64, |acc, &d| acc.checked_mul(d))
        .ok_or(ShapeError::Overflow { quantity })
}
