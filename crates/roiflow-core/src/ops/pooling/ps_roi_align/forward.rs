//! Forward pass: per-region precomputed sampling table, average pooling per channel group.

use super::geometry::{bilinear_corners, PSRoIAlignParams, RoiGeometry, ROI_FIELDS};
use crate::config::PoolingConfig;
use num_traits::{Float, FromPrimitive};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Four corner offsets and weights of one sample, valid for every channel of a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilinearSample<T> {
    pub offsets: [usize; 4],
    pub weights: [T; 4],
}

impl<T: Float> BilinearSample<T> {
    /// Placeholder for a sample outside the feature map: reads pixel 0 with zero weight
    pub fn empty() -> Self {
        Self {
            offsets: [0; 4],
            weights: [T::zero(); 4],
        }
    }
}

/// Build the sampling table of one region, ordered by `(ph, pw, iy, ix)`.
pub fn precompute_bilinear_samples<T: Float + FromPrimitive>(
    geometry: &RoiGeometry<T>,
    pooled_height: usize,
    pooled_width: usize,
    height: usize,
    width: usize,
) -> Vec<BilinearSample<T>> {
    let mut table =
        Vec::with_capacity(pooled_height * pooled_width * geometry.grid_h * geometry.grid_w);

    for ph in 0..pooled_height {
        for pw in 0..pooled_width {
            for iy in 0..geometry.grid_h {
                let y = geometry.sample_y(ph, iy);
                for ix in 0..geometry.grid_w {
                    let x = geometry.sample_x(pw, ix);
                    let sample = match bilinear_corners(height, width, y, x) {
                        Some(corners) => BilinearSample {
                            offsets: corners.offsets(width),
                            weights: corners.weights,
                        },
                        None => BilinearSample::empty(),
                    };
                    table.push(sample);
                }
            }
        }
    }

    table
}

/// Pool every region of `rois` from a contiguous `[N, C, H, W]` feature map.
///
/// `output` is the contiguous `[R, out_channels, pooled_height, pooled_width]`
/// buffer and is fully overwritten.
pub fn ps_roi_align_forward_kernel<T>(
    input: &[T],
    input_dims: [usize; 4],
    rois: &[T],
    params: &PSRoIAlignParams,
    output: &mut [T],
    config: &PoolingConfig,
) where
    T: Float + FromPrimitive + Send + Sync,
{
    let region_len = params.region_len();
    let num_rois = rois.len() / ROI_FIELDS;
    if region_len == 0 || num_rois == 0 {
        return;
    }
    debug_assert_eq!(output.len(), num_rois * region_len);

    let pool_region = |(region_out, roi): (&mut [T], &[T])| {
        forward_region(input, input_dims, roi, params, region_out);
    };

    #[cfg(feature = "parallel")]
    if config.use_parallel(num_rois) {
        output
            .par_chunks_mut(region_len)
            .zip(rois.par_chunks(ROI_FIELDS))
            .for_each(pool_region);
        return;
    }

    #[cfg(not(feature = "parallel"))]
    let _ = config;

    output
        .chunks_mut(region_len)
        .zip(rois.chunks(ROI_FIELDS))
        .for_each(pool_region);
}

fn forward_region<T: Float + FromPrimitive>(
    input: &[T],
    input_dims: [usize; 4],
    roi: &[T],
    params: &PSRoIAlignParams,
    region_out: &mut [T],
) {
    let [batch_size, channels, height, width] = input_dims;
    let plane = height * width;
    if plane == 0 {
        region_out.fill(T::zero());
        return;
    }

    let geometry = RoiGeometry::new(roi, params, batch_size);
    let Some(batch) = geometry.batch_index else {
        log::debug!(
            "ps_roi_align_forward: region batch index {:?} outside batch of {}",
            roi[0].to_f64(),
            batch_size
        );
        region_out.fill(T::zero());
        return;
    };

    let table = precompute_bilinear_samples(
        &geometry,
        params.pooled_height,
        params.pooled_width,
        height,
        width,
    );

    let bins = params.bins();
    let samples_per_bin = geometry.grid_h * geometry.grid_w;
    let image = &input[batch * channels * plane..(batch + 1) * channels * plane];

    for (c, channel_out) in region_out.chunks_mut(bins).enumerate() {
        for (bin, (out, bin_samples)) in channel_out
            .iter_mut()
            .zip(table.chunks(samples_per_bin))
            .enumerate()
        {
            let ic = c * bins + bin;
            let channel = &image[ic * plane..(ic + 1) * plane];
            let sum = bin_samples.iter().fold(T::zero(), |acc, s| {
                acc + s.weights[0] * channel[s.offsets[0]]
                    + s.weights[1] * channel[s.offsets[1]]
                    + s.weights[2] * channel[s.offsets[2]]
                    + s.weights[3] * channel[s.offsets[3]]
            });
            *out = sum / geometry.count;
        }
    }
}
