//! Position-sensitive ROI Align
//!
//! Pools each region of interest into a fixed `pooled_height x pooled_width`
//! grid of bins. Output channel `c` at bin `(ph, pw)` only ever reads input
//! channel `c * pooled_height * pooled_width + ph * pooled_width + pw`, and
//! every bin is the average of a regular grid of bilinear samples.
//!
//! Regions are rows `[batch_index, x1, y1, x2, y2]` in image coordinates and
//! are mapped onto the feature map by independent vertical and horizontal
//! scales.

mod backward;
mod dynamic;
mod forward;
mod geometry;

pub use backward::ps_roi_align_backward_kernel;
pub use dynamic::{ps_roi_align_backward_dyn, ps_roi_align_forward_dyn, FloatTensor};
pub use forward::{precompute_bilinear_samples, ps_roi_align_forward_kernel, BilinearSample};
pub use geometry::{bilinear_corners, BilinearCorners, PSRoIAlignParams, RoiGeometry, ROI_FIELDS};

use crate::config::{get_pooling_config, PoolingConfig};
use crate::tensor::StridedView;
use crate::{ErrorContext, Result, Tensor, TensorError};
use num_traits::{Float, FromPrimitive};

const FORWARD_OP: &str = "ps_roi_align_forward";
const BACKWARD_OP: &str = "ps_roi_align_backward";

/// Position-sensitive ROI Align forward pass
///
/// # Arguments
/// * `feature_map` - Input feature map `[N, C, H, W]` with
///   `C = out_channels * pooled_height * pooled_width`
/// * `rois` - Regions `[R, 5]`, each row `[batch_index, x1, y1, x2, y2]`
/// * `scale_h`, `scale_w` - Factors mapping region coordinates onto feature-map rows and columns
/// * `sampling_ratio` - Samples per bin edge; `<= 0` derives it from the region size
///
/// Returns the pooled output `[R, out_channels, pooled_height, pooled_width]`.
#[allow(clippy::too_many_arguments)]
pub fn ps_roi_align_forward<T>(
    feature_map: &Tensor<T>,
    rois: &Tensor<T>,
    scale_h: f32,
    scale_w: f32,
    out_channels: usize,
    pooled_height: usize,
    pooled_width: usize,
    sampling_ratio: i32,
) -> Result<Tensor<T>>
where
    T: Float + FromPrimitive + Send + Sync + 'static,
{
    let params = PSRoIAlignParams::new(
        scale_h,
        scale_w,
        out_channels,
        pooled_height,
        pooled_width,
        sampling_ratio,
    );
    ps_roi_align_forward_with_config(feature_map, rois, &params, &get_pooling_config())
}

/// Forward pass with explicit parameters and execution configuration
pub fn ps_roi_align_forward_with_config<T>(
    feature_map: &Tensor<T>,
    rois: &Tensor<T>,
    params: &PSRoIAlignParams,
    config: &PoolingConfig,
) -> Result<Tensor<T>>
where
    T: Float + FromPrimitive + Send + Sync + 'static,
{
    validate_params(FORWARD_OP, params)?;
    let input_dims = feature_map.shape().as_nchw().ok_or_else(|| {
        TensorError::invalid_shape(
            FORWARD_OP,
            "feature map must be 4D [batch, channels, height, width]",
            feature_map.shape().dims(),
        )
    })?;
    let num_rois = validate_rois(FORWARD_OP, rois)?;
    validate_channels(FORWARD_OP, params, input_dims[1], feature_map, rois)?;

    let output_dims = params.output_dims(num_rois);
    log::debug!(
        "{}: input {:?}, {} regions, output {:?}, sampling_ratio {}",
        FORWARD_OP,
        input_dims,
        num_rois,
        output_dims,
        params.sampling_ratio
    );

    if num_rois == 0 {
        log::trace!("{}: no regions, returning empty output", FORWARD_OP);
        return Ok(Tensor::zeros(&output_dims));
    }
    if input_dims[2] == 0 || input_dims[3] == 0 {
        log::trace!("{}: empty spatial extent, every sample is empty", FORWARD_OP);
        return Ok(Tensor::zeros(&output_dims));
    }

    let input = feature_map.contiguous_data();
    let roi_data = rois.contiguous_data();
    let mut output = vec![T::zero(); output_dims.iter().product()];

    ps_roi_align_forward_kernel(&input, input_dims, &roi_data, params, &mut output, config);

    Tensor::from_vec(output, &output_dims)
}

/// Position-sensitive ROI Align backward pass
///
/// # Arguments
/// * `grad` - Upstream gradient `[R, out_channels, pooled_height, pooled_width]`, any strides
/// * `rois` - The regions the forward pass pooled
/// * `batch_size`, `channels`, `height`, `width` - Shape of the forward feature map
///
/// Returns the feature-map gradient `[batch_size, channels, height, width]`.
#[allow(clippy::too_many_arguments)]
pub fn ps_roi_align_backward<T>(
    grad: &Tensor<T>,
    rois: &Tensor<T>,
    scale_h: f32,
    scale_w: f32,
    out_channels: usize,
    pooled_height: usize,
    pooled_width: usize,
    batch_size: usize,
    channels: usize,
    height: usize,
    width: usize,
    sampling_ratio: i32,
) -> Result<Tensor<T>>
where
    T: Float + FromPrimitive + Send + Sync + 'static,
{
    let params = PSRoIAlignParams::new(
        scale_h,
        scale_w,
        out_channels,
        pooled_height,
        pooled_width,
        sampling_ratio,
    );
    ps_roi_align_backward_with_config(
        grad,
        rois,
        &params,
        [batch_size, channels, height, width],
        &get_pooling_config(),
    )
}

/// Backward pass with explicit parameters and execution configuration
pub fn ps_roi_align_backward_with_config<T>(
    grad: &Tensor<T>,
    rois: &Tensor<T>,
    params: &PSRoIAlignParams,
    input_dims: [usize; 4],
    config: &PoolingConfig,
) -> Result<Tensor<T>>
where
    T: Float + FromPrimitive + Send + Sync + 'static,
{
    validate_params(BACKWARD_OP, params)?;
    let num_rois = validate_rois(BACKWARD_OP, rois)?;
    validate_channels(BACKWARD_OP, params, input_dims[1], grad, rois)?;

    let expected = params.output_dims(num_rois);
    if grad.shape().dims() != expected {
        return Err(TensorError::shape_mismatch(
            BACKWARD_OP,
            &format!("gradient of shape {expected:?}"),
            &format!("{}", grad.shape()),
        )
        .with_context(
            ErrorContext::new()
                .with_input_tensor(grad.shape().dims(), grad.dtype())
                .with_input_tensor(rois.shape().dims(), rois.dtype()),
        ));
    }

    log::debug!(
        "{}: grad {}, {} regions, input {:?}, contiguous grad {}",
        BACKWARD_OP,
        grad.shape(),
        num_rois,
        input_dims,
        grad.is_contiguous()
    );

    let mut grad_input = vec![T::zero(); input_dims.iter().product()];
    if num_rois == 0 || grad_input.is_empty() {
        log::trace!("{}: nothing to scatter, returning zero gradient", BACKWARD_OP);
        return Tensor::from_vec(grad_input, &input_dims);
    }

    let roi_data = rois.contiguous_data();
    match grad.try_strided_view() {
        Some(view) => ps_roi_align_backward_kernel(
            view,
            &roi_data,
            params,
            input_dims,
            &mut grad_input,
            config,
        ),
        None => {
            let dense = grad.to_contiguous_vec();
            ps_roi_align_backward_kernel(
                StridedView::contiguous(&dense, expected),
                &roi_data,
                params,
                input_dims,
                &mut grad_input,
                config,
            )
        }
    }

    Tensor::from_vec(grad_input, &input_dims)
}

fn validate_params(operation: &str, params: &PSRoIAlignParams) -> Result<()> {
    if params.pooled_height == 0 || params.pooled_width == 0 {
        return Err(TensorError::invalid_argument_op(
            operation,
            &format!(
                "pooled size must be positive, got {}x{}",
                params.pooled_height, params.pooled_width
            ),
        ));
    }
    if params.out_channels == 0 {
        return Err(TensorError::invalid_argument_op(
            operation,
            "out_channels must be positive",
        ));
    }
    Ok(())
}

/// Checks the region tensor is `[R, 5]` and returns `R`
fn validate_rois<T>(operation: &str, rois: &Tensor<T>) -> Result<usize> {
    match rois.shape().dims() {
        &[num_rois, ROI_FIELDS] => Ok(num_rois),
        dims => Err(TensorError::invalid_shape(
            operation,
            "regions must be 2D [num_rois, 5] with rows [batch_index, x1, y1, x2, y2]",
            dims,
        )),
    }
}

fn validate_channels<T: 'static>(
    operation: &str,
    params: &PSRoIAlignParams,
    channels: usize,
    data: &Tensor<T>,
    rois: &Tensor<T>,
) -> Result<()> {
    let expected = params.input_channels();
    if channels == expected {
        return Ok(());
    }
    Err(TensorError::shape_mismatch(
        operation,
        &format!(
            "{} channels (out_channels {} x pooled {}x{})",
            expected, params.out_channels, params.pooled_height, params.pooled_width
        ),
        &channels.to_string(),
    )
    .with_context(
        ErrorContext::new()
            .with_input_tensor(data.shape().dims(), data.dtype())
            .with_input_tensor(rois.shape().dims(), rois.dtype())
            .with_metadata("out_channels", params.out_channels.to_string())
            .with_metadata(
                "pooled_size",
                format!("{}x{}", params.pooled_height, params.pooled_width),
            ),
    ))
}
