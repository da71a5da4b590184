//! Backward pass: scatter-add of pooled gradients into the feature-map gradient.
//!
//! Sampling coordinates and corner weights are recomputed per output element
//! through the same [`bilinear_corners`] the forward table is built from, so
//! the two passes stay exact adjoints. Concurrent regions write overlapping
//! pixels; each worker accumulates a contiguous partition of regions into its
//! own zeroed buffer and the partitions are summed in partition order.

use super::geometry::{bilinear_corners, PSRoIAlignParams, RoiGeometry, ROI_FIELDS};
use crate::config::PoolingConfig;
use crate::tensor::StridedView;
use num_traits::{Float, FromPrimitive};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::ops::Range;

#[cfg(feature = "parallel")]
const MERGE_CHUNK: usize = 4096;

/// Accumulate the gradient of every region into `grad_input`.
///
/// `grad_output` is the `[R, out_channels, pooled_height, pooled_width]`
/// upstream gradient, `grad_input` the zero-initialised contiguous
/// `[N, C, H, W]` buffer described by `input_dims`.
pub fn ps_roi_align_backward_kernel<T>(
    grad_output: StridedView<'_, T>,
    rois: &[T],
    params: &PSRoIAlignParams,
    input_dims: [usize; 4],
    grad_input: &mut [T],
    config: &PoolingConfig,
) where
    T: Float + FromPrimitive + Send + Sync,
{
    let num_rois = rois.len() / ROI_FIELDS;
    if num_rois == 0 || params.region_len() == 0 || grad_input.is_empty() {
        return;
    }

    let partitions = config.backward_partitions(num_rois);
    if partitions <= 1 {
        accumulate_regions(grad_output, rois, 0..num_rois, params, input_dims, grad_input);
        return;
    }

    #[cfg(feature = "parallel")]
    {
        let len = grad_input.len();
        let ranges = partition_ranges(num_rois, partitions);
        log::trace!(
            "ps_roi_align_backward: {} regions over {} partial buffers",
            num_rois,
            ranges.len()
        );

        let partials: Vec<Vec<T>> = ranges
            .into_par_iter()
            .map(|range| {
                let mut partial = vec![T::zero(); len];
                accumulate_regions(grad_output, rois, range, params, input_dims, &mut partial);
                partial
            })
            .collect();

        grad_input
            .par_chunks_mut(MERGE_CHUNK)
            .enumerate()
            .for_each(|(chunk_idx, chunk)| {
                let base = chunk_idx * MERGE_CHUNK;
                let len = chunk.len();
                for partial in &partials {
                    for (dst, &src) in chunk.iter_mut().zip(&partial[base..base + len]) {
                        *dst = *dst + src;
                    }
                }
            });
    }

    #[cfg(not(feature = "parallel"))]
    accumulate_regions(grad_output, rois, 0..num_rois, params, input_dims, grad_input);
}

/// Split `0..num_rois` into at most `partitions` contiguous, non-empty ranges.
#[cfg_attr(not(feature = "parallel"), allow(dead_code))]
pub(crate) fn partition_ranges(num_rois: usize, partitions: usize) -> Vec<Range<usize>> {
    let partitions = partitions.clamp(1, num_rois.max(1));
    let chunk = num_rois.div_ceil(partitions);
    (0..num_rois)
        .step_by(chunk.max(1))
        .map(|start| start..(start + chunk).min(num_rois))
        .collect()
}

fn accumulate_regions<T: Float + FromPrimitive>(
    grad_output: StridedView<'_, T>,
    rois: &[T],
    regions: Range<usize>,
    params: &PSRoIAlignParams,
    input_dims: [usize; 4],
    grad_input: &mut [T],
) {
    for n in regions {
        let roi = &rois[n * ROI_FIELDS..(n + 1) * ROI_FIELDS];
        accumulate_region(grad_output, n, roi, params, input_dims, grad_input);
    }
}

fn accumulate_region<T: Float + FromPrimitive>(
    grad_output: StridedView<'_, T>,
    n: usize,
    roi: &[T],
    params: &PSRoIAlignParams,
    input_dims: [usize; 4],
    grad_input: &mut [T],
) {
    let [batch_size, channels, height, width] = input_dims;
    let geometry = RoiGeometry::new(roi, params, batch_size);
    let Some(batch) = geometry.batch_index else {
        return;
    };
    let plane = height * width;

    for c in 0..params.out_channels {
        for ph in 0..params.pooled_height {
            for pw in 0..params.pooled_width {
                let ic = params.input_channel(c, ph, pw);
                let channel_base = (batch * channels + ic) * plane;
                let grad_this_bin = grad_output.at(n, c, ph, pw);

                for iy in 0..geometry.grid_h {
                    let y = geometry.sample_y(ph, iy);
                    for ix in 0..geometry.grid_w {
                        let x = geometry.sample_x(pw, ix);
                        let Some(corners) = bilinear_corners(height, width, y, x) else {
                            continue;
                        };
                        let offsets = corners.offsets(width);
                        for (offset, weight) in offsets.into_iter().zip(corners.weights) {
                            let pixel = &mut grad_input[channel_base + offset];
                            *pixel = *pixel + grad_this_bin * weight / geometry.count;
                        }
                    }
                }
            }
        }
    }
}
