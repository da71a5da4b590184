//! Position-sensitive ROI Align layer
//!
//! Detection heads in the R-FCN family score each region from a bank of
//! `out_channels * pooled_height * pooled_width` score maps. The layer pools
//! every region with [`roiflow_core::ps_roi_align_forward`] and keeps what the
//! backward pass needs to route the pooled gradient back onto the score maps.

use num_traits::{Float, FromPrimitive};
use roiflow_core::{
    get_pooling_config, ps_roi_align_backward_with_config, ps_roi_align_forward_with_config,
    PSRoIAlignParams, Result, Tensor, TensorError,
};
use std::cell::RefCell;

/// State recorded by [`PSROIAlign2D::forward`] for the matching backward call
#[derive(Debug, Clone)]
pub struct PSROIAlignContext<T> {
    /// Regions the forward pass pooled
    pub rois: Tensor<T>,
    /// `[batch, channels, height, width]` of the pooled feature map
    pub input_dims: [usize; 4],
}

/// Position-Sensitive ROI Align Layer
/// Pools each region into `out_channels` maps of `pooled_size` bins, one input channel per bin
#[derive(Debug, Clone)]
pub struct PSROIAlign2D<T> {
    out_channels: usize,
    pooled_size: (usize, usize),
    spatial_scale: (f32, f32),
    sampling_ratio: i32,
    context: RefCell<Option<PSROIAlignContext<T>>>,
}

impl<T> PSROIAlign2D<T> {
    pub fn new(
        out_channels: usize,
        pooled_size: (usize, usize),
        spatial_scale: f32,
        sampling_ratio: i32,
    ) -> Self {
        Self {
            out_channels,
            pooled_size,
            spatial_scale: (spatial_scale, spatial_scale),
            sampling_ratio,
            context: RefCell::new(None),
        }
    }

    /// Square pooled size constructor
    pub fn square(
        out_channels: usize,
        size: usize,
        spatial_scale: f32,
        sampling_ratio: i32,
    ) -> Self {
        Self::new(out_channels, (size, size), spatial_scale, sampling_ratio)
    }

    /// Auto sampling ratio constructor (sampling_ratio = -1 means adaptive)
    pub fn auto_sampling(
        out_channels: usize,
        pooled_size: (usize, usize),
        spatial_scale: f32,
    ) -> Self {
        Self::new(out_channels, pooled_size, spatial_scale, -1)
    }

    /// Use separate vertical and horizontal scales
    pub fn with_scales(mut self, scale_h: f32, scale_w: f32) -> Self {
        self.spatial_scale = (scale_h, scale_w);
        self
    }

    /// Channels the input feature map must have
    pub fn input_channels(&self) -> usize {
        self.out_channels * self.pooled_size.0 * self.pooled_size.1
    }

    pub fn params(&self) -> PSRoIAlignParams {
        PSRoIAlignParams::new(
            self.spatial_scale.0,
            self.spatial_scale.1,
            self.out_channels,
            self.pooled_size.0,
            self.pooled_size.1,
            self.sampling_ratio,
        )
    }

    /// Whether a forward pass has been recorded and not yet consumed
    pub fn has_context(&self) -> bool {
        self.context.borrow().is_some()
    }

    /// Drop the recorded forward state
    pub fn clear_context(&self) {
        self.context.borrow_mut().take();
    }
}

impl<T> PSROIAlign2D<T>
where
    T: Float + FromPrimitive + Send + Sync + 'static,
{
    /// Pool `rois` from `feature_map` and record the call for [`Self::backward`]
    pub fn forward(&self, feature_map: &Tensor<T>, rois: &Tensor<T>) -> Result<Tensor<T>> {
        let output = self.forward_inference(feature_map, rois)?;
        let input_dims = feature_map.shape().as_nchw().ok_or_else(|| {
            TensorError::invalid_shape(
                "PSROIAlign2D::forward",
                "feature map must be 4D",
                feature_map.shape().dims(),
            )
        })?;

        *self.context.borrow_mut() = Some(PSROIAlignContext {
            rois: rois.clone(),
            input_dims,
        });
        Ok(output)
    }

    /// Pool without recording anything
    pub fn forward_inference(
        &self,
        feature_map: &Tensor<T>,
        rois: &Tensor<T>,
    ) -> Result<Tensor<T>> {
        ps_roi_align_forward_with_config(feature_map, rois, &self.params(), &get_pooling_config())
    }

    /// Gradient of the last recorded forward with respect to its feature map.
    ///
    /// The recorded state is kept, so one forward may be followed by several
    /// backward calls with different upstream gradients.
    pub fn backward(&self, grad_output: &Tensor<T>) -> Result<Tensor<T>> {
        let context = self.context.borrow();
        let context = context.as_ref().ok_or_else(|| {
            TensorError::invalid_operation_op(
                "PSROIAlign2D::backward",
                "backward called before forward",
            )
        })?;

        log::trace!(
            "PSROIAlign2D::backward: {} regions into {:?}",
            context.rois.shape().dims()[0],
            context.input_dims
        );
        ps_roi_align_backward_with_config(
            grad_output,
            &context.rois,
            &self.params(),
            context.input_dims,
            &get_pooling_config(),
        )
    }
}
