//! Runtime element-type dispatch for the pooling entry points.

use super::{ps_roi_align_backward_with_config, ps_roi_align_forward_with_config, PSRoIAlignParams};
use crate::config::get_pooling_config;
use crate::{DType, Result, Tensor, TensorError};
use half::{bf16, f16};

/// A tensor of any floating-point element type the operators support
#[derive(Debug, Clone)]
pub enum FloatTensor {
    F16(Tensor<f16>),
    BF16(Tensor<bf16>),
    F32(Tensor<f32>),
    F64(Tensor<f64>),
}

impl FloatTensor {
    pub fn dtype(&self) -> DType {
        match self {
            FloatTensor::F16(_) => DType::Float16,
            FloatTensor::BF16(_) => DType::BFloat16,
            FloatTensor::F32(_) => DType::Float32,
            FloatTensor::F64(_) => DType::Float64,
        }
    }

    pub fn dims(&self) -> &[usize] {
        match self {
            FloatTensor::F16(t) => t.shape().dims(),
            FloatTensor::BF16(t) => t.shape().dims(),
            FloatTensor::F32(t) => t.shape().dims(),
            FloatTensor::F64(t) => t.shape().dims(),
        }
    }
}

impl From<Tensor<f16>> for FloatTensor {
    fn from(tensor: Tensor<f16>) -> Self {
        FloatTensor::F16(tensor)
    }
}

impl From<Tensor<bf16>> for FloatTensor {
    fn from(tensor: Tensor<bf16>) -> Self {
        FloatTensor::BF16(tensor)
    }
}

impl From<Tensor<f32>> for FloatTensor {
    fn from(tensor: Tensor<f32>) -> Self {
        FloatTensor::F32(tensor)
    }
}

impl From<Tensor<f64>> for FloatTensor {
    fn from(tensor: Tensor<f64>) -> Self {
        FloatTensor::F64(tensor)
    }
}

/// Forward pass over tensors whose element type is only known at runtime.
///
/// Both tensors must share one element type.
pub fn ps_roi_align_forward_dyn(
    feature_map: &FloatTensor,
    rois: &FloatTensor,
    params: &PSRoIAlignParams,
) -> Result<FloatTensor> {
    let config = get_pooling_config();
    match (feature_map, rois) {
        (FloatTensor::F16(x), FloatTensor::F16(r)) => {
            ps_roi_align_forward_with_config(x, r, params, &config).map(FloatTensor::F16)
        }
        (FloatTensor::BF16(x), FloatTensor::BF16(r)) => {
            ps_roi_align_forward_with_config(x, r, params, &config).map(FloatTensor::BF16)
        }
        (FloatTensor::F32(x), FloatTensor::F32(r)) => {
            ps_roi_align_forward_with_config(x, r, params, &config).map(FloatTensor::F32)
        }
        (FloatTensor::F64(x), FloatTensor::F64(r)) => {
            ps_roi_align_forward_with_config(x, r, params, &config).map(FloatTensor::F64)
        }
        (x, r) => Err(TensorError::dtype_mismatch(
            "ps_roi_align_forward",
            x.dtype(),
            r.dtype(),
        )),
    }
}

/// Backward pass over tensors whose element type is only known at runtime.
pub fn ps_roi_align_backward_dyn(
    grad: &FloatTensor,
    rois: &FloatTensor,
    params: &PSRoIAlignParams,
    input_dims: [usize; 4],
) -> Result<FloatTensor> {
    let config = get_pooling_config();
    match (grad, rois) {
        (FloatTensor::F16(g), FloatTensor::F16(r)) => {
            ps_roi_align_backward_with_config(g, r, params, input_dims, &config)
                .map(FloatTensor::F16)
        }
        (FloatTensor::BF16(g), FloatTensor::BF16(r)) => {
            ps_roi_align_backward_with_config(g, r, params, input_dims, &config)
                .map(FloatTensor::BF16)
        }
        (FloatTensor::F32(g), FloatTensor::F32(r)) => {
            ps_roi_align_backward_with_config(g, r, params, input_dims, &config)
                .map(FloatTensor::F32)
        }
        (FloatTensor::F64(g), FloatTensor::F64(r)) => {
            ps_roi_align_backward_with_config(g, r, params, input_dims, &config)
                .map(FloatTensor::F64)
        }
        (g, r) => Err(TensorError::dtype_mismatch(
            "ps_roi_align_backward",
            g.dtype(),
            r.dtype(),
        )),
    }
}
