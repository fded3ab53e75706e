//! Image processing: pure Rust, buffer in, buffer out.
//!
//! | Operation | Where |
//! |---|---|
//! | **Descriptors** | [`operation`]: JSON → typed [`Operation`] |
//! | **Resize / crop / pad** | [`filters`] + dimension math in `calculations` |
//! | **Intensity / blur / normalize** | [`filters`] |
//! | **Edge detection** | [`edges`] |
//! | **Ordered application** | [`pipeline`] |
//! | **Decode / encode** | [`ImageBackend`] + [`RustBackend`] |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Encoder settings ([`Quality`], [`FormatFamily`])
//! - **Filters / Edges**: Pure pixel transforms on `RgbImage`
//! - **Pipeline**: Applies an operation list against an original and a working copy
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
pub mod edges;
pub mod filters;
pub mod operation;
mod params;
pub mod pipeline;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{MAX_BLUR, MAX_SIDE};
pub use operation::{Operation, OperationSpec, parse_operations};
pub use params::{FormatFamily, Quality};
pub use pipeline::{
    PipelineError, PipelineOutcome, SkippedOperation, UnknownOps, apply, apply_with, validate,
};
pub use rust_backend::{RustBackend, is_supported_image};
