//! Tiling planner for gather-along-axis kernels.
//!
//! Given a gather's shapes and dtypes plus the target's resource limits
//! (execution units, per-unit scratch, alignment), the planner picks one of
//! eight tiling modes and computes the work split, the scratch layout and the
//! dispatch key the execution kernel needs. Planning is pure and
//! deterministic; nothing here touches a device.
//!
//! ```
//! use gather_tiling::{DataType, GatherRequest, ResourceLimits, TilingMode, plan};
//!
//! let request = GatherRequest::new(vec![1, 1000], vec![4000], DataType::F32, 1);
//! let plan = plan(&request, &ResourceLimits::default()).unwrap();
//! assert_eq!(plan.mode, TilingMode::LastAxisGatherCache);
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod dtype;
pub mod error;
pub mod key;
pub mod limits;
pub mod mode;
pub mod plan;
pub mod shape;
pub mod sizer;
pub mod split;

pub use cache::{CacheStats, PlanCache};
pub use config::{ConfigError, PlannerConfig, SimdThresholds};
pub use context::PlanContext;
pub use dtype::{DataType, IndexType, improve_width};
pub use error::{CapacityError, ShapeError, TilingError, TilingResult};
pub use key::{DecodedKey, KeyFlags, TilingKey};
pub use limits::ResourceLimits;
pub use mode::{CascadeStep, ModeSelection, ModeSelector, PredicateTable, TilingMode};
pub use plan::{ShapeScalars, TilingPlan, TilingPlanner, plan};
pub use shape::{GatherRequest, ShapeFacts, normalize};
pub use sizer::{ModeSizing, Residency, ScratchLayout};
pub use split::{WorkSplit, even_split, shrink_lanes};
