//! # RoiFlow - Position-Sensitive ROI Align for Rust
//!
//! RoiFlow implements the position-sensitive ROI Align operator used by
//! R-FCN style detection heads, with an exact hand-derived backward pass.
//!
//! - **Bilinear sampling**: each output bin averages a regular grid of bilinear samples
//! - **Position sensitivity**: every bin reads its own dedicated input channel
//! - **Parallel**: forward and backward fan out over regions on the rayon pool
//! - **Reproducible gradients**: a fixed partial-buffer count makes backward bit-stable
//!
//! ## Quick Start
//!
//! ```rust
//! use roiflow::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let feature_map = Tensor::from_vec((0..64).map(|v| v as f32).collect(), &[1, 4, 4, 4])?;
//! let rois = Tensor::from_vec(vec![0.0, 0.0, 0.0, 4.0, 4.0], &[1, 5])?;
//!
//! // one output channel pooled into 2x2 bins, one sample per bin
//! let pooled = ps_roi_align_forward(&feature_map, &rois, 1.0, 1.0, 1, 2, 2, 1)?;
//! assert_eq!(pooled.to_contiguous_vec(), vec![5.0, 23.0, 45.0, 63.0]);
//!
//! let grad = Tensor::full(&[1, 1, 2, 2], 1.0f32);
//! let grad_input = ps_roi_align_backward(&grad, &rois, 1.0, 1.0, 1, 2, 2, 1, 4, 4, 4, 1)?;
//! assert_eq!(grad_input.shape().dims(), &[1, 4, 4, 4]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! ```rust
//! use roiflow::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let layer = PSROIAlign2D::square(2, 2, 0.5, -1);
//! let scores = Tensor::<f64>::zeros(&[1, layer.input_channels(), 6, 6]);
//! let rois = Tensor::from_vec(vec![0.0, 2.0, 2.0, 10.0, 9.0], &[1, 5])?;
//!
//! let pooled = layer.forward(&scores, &rois)?;
//! let grad = layer.backward(&Tensor::full(pooled.shape().dims(), 1.0))?;
//! assert_eq!(grad.shape().dims(), scores.shape().dims());
//! # Ok(())
//! # }
//! ```
//!
//! ## Execution
//!
//! The `parallel` feature (on by default) runs both passes on the rayon pool.
//! [`prelude::PoolingConfigScope`] overrides the process-wide
//! [`prelude::PoolingConfig`] for a block of code.

#![deny(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::result_large_err)]

pub use roiflow_core as core;
pub use roiflow_neural as neural;

/// Prelude module for convenient imports
///
/// ```rust
/// use roiflow::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::ops;
    pub use crate::core::{DType, Result, Shape, Tensor, TensorError};

    // Operators
    pub use crate::core::{
        ps_roi_align_backward, ps_roi_align_backward_with_config, ps_roi_align_forward,
        ps_roi_align_forward_with_config, PSRoIAlignParams,
    };

    // Execution configuration
    pub use crate::core::{
        get_pooling_config, set_pooling_config, PoolingConfig, PoolingConfigScope,
    };

    // Layers
    pub use crate::neural::PSROIAlign2D;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the version of RoiFlow
pub fn version() -> &'static str {
    VERSION
}
