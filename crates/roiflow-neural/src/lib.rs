//! # RoiFlow Neural
//!
//! Detection-head layers built on the `roiflow-core` pooling operators.
//!
//! ```rust
//! use roiflow_core::Tensor;
//! use roiflow_neural::PSROIAlign2D;
//!
//! # fn main() -> roiflow_core::Result<()> {
//! // 2 classes scored over a 3x3 grid of position-sensitive maps
//! let layer = PSROIAlign2D::square(2, 3, 0.25, 2);
//! let scores = Tensor::<f32>::zeros(&[1, layer.input_channels(), 8, 8]);
//! let rois = Tensor::from_vec(vec![0.0, 4.0, 4.0, 28.0, 20.0], &[1, 5])?;
//!
//! let pooled = layer.forward(&scores, &rois)?;
//! assert_eq!(pooled.shape().dims(), &[1, 2, 3, 3]);
//!
//! let grad = layer.backward(&Tensor::zeros(&[1, 2, 3, 3]))?;
//! assert_eq!(grad.shape().dims(), scores.shape().dims());
//! # Ok(())
//! # }
//! ```

#![allow(clippy::result_large_err)]

pub mod layers;

pub use layers::{PSROIAlign2D, PSROIAlignContext};
