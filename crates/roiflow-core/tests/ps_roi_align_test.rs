use num_traits::Float;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use roiflow_core::numerical_gradient::{check_adjoint, check_gradients, GradientCheckConfig};
use roiflow_core::ops::pooling::ps_roi_align::ROI_FIELDS;
use roiflow_core::{
    f16, ps_roi_align_backward, ps_roi_align_backward_with_config, ps_roi_align_forward,
    ps_roi_align_forward_with_config, PSRoIAlignParams, PoolingConfig, Result, Tensor,
    TensorError,
};
use std::fmt::Debug;

const RTOL: f64 = 1e-10;
const ATOL: f64 = 1e-12;

fn assert_tensors_close<T>(actual: &Tensor<T>, expected: &[T], rtol: T, atol: T, msg: &str)
where
    T: Float + Debug,
{
    let actual = actual.to_contiguous_vec();
    assert_eq!(actual.len(), expected.len(), "{}: element count mismatch", msg);

    for (i, (&a, &e)) in actual.iter().zip(expected.iter()).enumerate() {
        let diff = (a - e).abs();
        let tolerance = atol + rtol * e.abs();
        assert!(
            diff <= tolerance,
            "{}: Element {} differs: actual={:?}, expected={:?}, diff={:?}",
            msg,
            i,
            a,
            e,
            diff
        );
    }
}

/// Feature map `[1, 4, 4, 4]` with value `16c + 4y + x`
fn ramp_feature_map() -> Tensor<f64> {
    Tensor::from_vec((0..64).map(|v| v as f64).collect(), &[1, 4, 4, 4]).unwrap()
}

fn rois(rows: &[[f64; 5]]) -> Tensor<f64> {
    Tensor::from_vec(rows.iter().flatten().copied().collect(), &[rows.len(), ROI_FIELDS]).unwrap()
}

fn random_tensor(rng: &mut StdRng, shape: &[usize]) -> Tensor<f64> {
    let n: usize = shape.iter().product();
    Tensor::from_vec((0..n).map(|_| rng.gen_range(-1.0..1.0)).collect(), shape).unwrap()
}

fn random_rois(rng: &mut StdRng, count: usize, batch: usize, extent: f64) -> Tensor<f64> {
    let mut data = Vec::with_capacity(count * ROI_FIELDS);
    for _ in 0..count {
        let x1 = rng.gen_range(-2.0..extent);
        let y1 = rng.gen_range(-2.0..extent);
        data.extend_from_slice(&[
            rng.gen_range(0..batch) as f64,
            x1,
            y1,
            x1 + rng.gen_range(-0.5..extent),
            y1 + rng.gen_range(-0.5..extent),
        ]);
    }
    Tensor::from_vec(data, &[count, ROI_FIELDS]).unwrap()
}

/// Direct per-sample evaluation without the shared sampling table
mod reference_implementations {
    fn axis(coord: f64, size: usize) -> (usize, usize, f64) {
        let low = coord.max(0.0).floor() as usize;
        if low >= size - 1 {
            (size - 1, size - 1, 0.0)
        } else {
            (low, low + 1, coord.max(0.0) - low as f64)
        }
    }

    fn bilinear(plane: &[f64], height: usize, width: usize, y: f64, x: f64) -> f64 {
        if !(y > -1.0 && y < height as f64 && x > -1.0 && x < width as f64) {
            return 0.0;
        }
        let (y_low, y_high, ly) = axis(y, height);
        let (x_low, x_high, lx) = axis(x, width);
        let (hy, hx) = (1.0 - ly, 1.0 - lx);
        hy * hx * plane[y_low * width + x_low]
            + hy * lx * plane[y_low * width + x_high]
            + ly * hx * plane[y_high * width + x_low]
            + ly * lx * plane[y_high * width + x_high]
    }

    pub fn ps_roi_align_reference(
        input: &[f64],
        dims: [usize; 4],
        rois: &[f64],
        scale: f64,
        out_channels: usize,
        pooled: usize,
        sampling_ratio: i32,
    ) -> Vec<f64> {
        let [batch, channels, height, width] = dims;
        let mut output = Vec::new();
        for roi in rois.chunks(5) {
            let b = roi[0];
            let (x1, y1) = (roi[1] * scale, roi[2] * scale);
            let roi_w = (roi[3] * scale - x1).max(1.0);
            let roi_h = (roi[4] * scale - y1).max(1.0);
            let (bin_h, bin_w) = (roi_h / pooled as f64, roi_w / pooled as f64);
            let grid = |bin: f64| {
                if sampling_ratio > 0 {
                    sampling_ratio as usize
                } else {
                    (bin.ceil() as usize).max(1)
                }
            };
            let (grid_h, grid_w) = (grid(bin_h), grid(bin_w));

            for c in 0..out_channels {
                for ph in 0..pooled {
                    for pw in 0..pooled {
                        if !(b >= 0.0 && (b as usize) < batch) {
                            output.push(0.0);
                            continue;
                        }
                        let ic = c * pooled * pooled + ph * pooled + pw;
                        let start = ((b as usize) * channels + ic) * height * width;
                        let plane = &input[start..start + height * width];
                        let mut sum = 0.0;
                        for iy in 0..grid_h {
                            let y =
                                y1 + ph as f64 * bin_h + (iy as f64 + 0.5) * bin_h / grid_h as f64;
                            for ix in 0..grid_w {
                                let x = x1
                                    + pw as f64 * bin_w
                                    + (ix as f64 + 0.5) * bin_w / grid_w as f64;
                                sum += bilinear(plane, height, width, y, x);
                            }
                        }
                        output.push(sum / (grid_h * grid_w) as f64);
                    }
                }
            }
        }
        output
    }
}

#[test]
fn test_forward_full_image_bin_centers() {
    let output = ps_roi_align_forward(
        &ramp_feature_map(),
        &rois(&[[0.0, 0.0, 0.0, 4.0, 4.0]]),
        1.0,
        1.0,
        1,
        2,
        2,
        1,
    )
    .unwrap();

    assert_eq!(output.shape().dims(), &[1, 1, 2, 2]);
    assert_tensors_close(&output, &[5.0, 23.0, 45.0, 63.0], RTOL, ATOL, "full image");
}

#[test]
fn test_forward_fractional_bin_centers() {
    let output = ps_roi_align_forward(
        &ramp_feature_map(),
        &rois(&[[0.0, 0.0, 0.0, 3.0, 3.0]]),
        1.0,
        1.0,
        1,
        2,
        2,
        1,
    )
    .unwrap();

    assert_tensors_close(&output, &[3.75, 21.25, 41.75, 59.25], RTOL, ATOL, "3x3 region");
}

#[test]
fn test_forward_matches_reference_on_random_inputs() {
    let mut rng = StdRng::seed_from_u64(7);
    let dims = [2, 18, 9, 11];
    let input = random_tensor(&mut rng, &dims);
    let regions = random_rois(&mut rng, 12, 2, 14.0);

    for sampling_ratio in [0, 1, 2, 3] {
        let output =
            ps_roi_align_forward(&input, &regions, 0.75, 0.75, 2, 3, 3, sampling_ratio).unwrap();
        let expected = reference_implementations::ps_roi_align_reference(
            input.as_slice().unwrap(),
            dims,
            regions.as_slice().unwrap(),
            0.75,
            2,
            3,
            sampling_ratio,
        );
        assert_tensors_close(&output, &expected, 1e-9, 1e-12, "random regions");
    }
}

#[test]
fn test_backward_ones_full_image() {
    let grad = Tensor::from_vec(vec![1.0f64; 4], &[1, 1, 2, 2]).unwrap();
    let grad_input = ps_roi_align_backward(
        &grad,
        &rois(&[[0.0, 0.0, 0.0, 4.0, 4.0]]),
        1.0,
        1.0,
        1,
        2,
        2,
        1,
        4,
        4,
        4,
        1,
    )
    .unwrap();

    assert_eq!(grad_input.shape().dims(), &[1, 4, 4, 4]);
    let mut expected = vec![0.0f64; 64];
    expected[5] = 1.0; // channel 0, (1, 1)
    expected[16 + 7] = 1.0; // channel 1, (1, 3)
    expected[32 + 13] = 1.0; // channel 2, (3, 1)
    expected[48 + 15] = 1.0; // channel 3, (3, 3)
    assert_tensors_close(&grad_input, &expected, RTOL, ATOL, "backward ones");
}

#[test]
fn test_zero_regions_short_circuit() {
    let empty = Tensor::<f64>::zeros(&[0, ROI_FIELDS]);
    let output = ps_roi_align_forward(&ramp_feature_map(), &empty, 1.0, 1.0, 1, 2, 2, 1).unwrap();
    assert_eq!(output.shape().dims(), &[0, 1, 2, 2]);
    assert!(output.is_empty());

    let grad = Tensor::<f64>::zeros(&[0, 1, 2, 2]);
    let grad_input =
        ps_roi_align_backward(&grad, &empty, 1.0, 1.0, 1, 2, 2, 3, 4, 5, 6, 1).unwrap();
    assert_eq!(grad_input.shape().dims(), &[3, 4, 5, 6]);
    assert!(grad_input.to_contiguous_vec().iter().all(|&v| v == 0.0));
}

#[test]
fn test_degenerate_boxes_use_unit_span() {
    let input = ramp_feature_map();
    let regions = rois(&[
        [0.0, 1.0, 1.0, 2.0, 2.0], // exactly one cell
        [0.0, 1.0, 1.0, 0.0, 0.0], // inverted
        [0.0, 1.0, 1.0, 1.0, 1.0], // zero area
        [0.0, 1.0, 1.0, 1.4, 1.2], // sub-cell
    ]);
    let output = ps_roi_align_forward(&input, &regions, 1.0, 1.0, 1, 2, 2, 0).unwrap();
    let values = output.to_contiguous_vec();

    for region in 1..4 {
        assert_eq!(&values[region * 4..region * 4 + 4], &values[0..4]);
    }
    // bins of 0.5, one sample each at 1.25 and 1.75
    assert!((values[0] - (4.0 * 1.25 + 1.25)).abs() < 1e-12);
}

#[test]
fn test_boundary_samples_are_empty() {
    let input = ramp_feature_map();
    let regions = rois(&[
        [0.0, 0.0, 3.0, 4.0, 5.0],   // sample row lands on y = 4
        [0.0, 3.0, 0.0, 5.0, 4.0],   // sample column lands on x = 4
        [0.0, -2.0, -2.0, 0.0, 0.0], // sample lands on (-1, -1)
        [0.0, 0.0, 2.0, 4.0, 4.0],   // sample row lands on y = 3: last row, not empty
    ]);
    let output = ps_roi_align_forward(&input, &regions, 1.0, 1.0, 4, 1, 1, 1).unwrap();
    let values = output.to_contiguous_vec();

    assert!(values[0..12].iter().all(|&v| v == 0.0));
    // channel c at (3, 2): 16c + 12 + 2
    assert_eq!(&values[12..16], &[14.0, 30.0, 46.0, 62.0]);

    let grad = Tensor::from_vec(vec![1.0f64; 16], &[4, 4, 1, 1]).unwrap();
    let grad_input =
        ps_roi_align_backward(&grad, &regions, 1.0, 1.0, 4, 1, 1, 1, 4, 4, 4, 1).unwrap();
    let total: f64 = grad_input.to_contiguous_vec().iter().sum();
    assert!((total - 4.0).abs() < 1e-12, "only the last region contributes, got {total}");
}

#[test]
fn test_position_sensitivity() {
    let base = ramp_feature_map();
    let mut perturbed = base.to_contiguous_vec();
    for v in perturbed[16..].iter_mut() {
        *v = *v * -3.0 + 1.5;
    }
    let perturbed = Tensor::from_vec(perturbed, &[1, 4, 4, 4]).unwrap();
    let regions = rois(&[[0.0, 0.3, 0.1, 3.7, 3.2]]);

    let a = ps_roi_align_forward(&base, &regions, 1.0, 1.0, 1, 2, 2, 2).unwrap();
    let b = ps_roi_align_forward(&perturbed, &regions, 1.0, 1.0, 1, 2, 2, 2).unwrap();

    // bin (0, 0) reads only channel 0
    assert_eq!(a.get(&[0, 0, 0, 0]), b.get(&[0, 0, 0, 0]));
    assert_ne!(a.get(&[0, 0, 0, 1]), b.get(&[0, 0, 0, 1]));
    assert_ne!(a.get(&[0, 0, 1, 1]), b.get(&[0, 0, 1, 1]));
}

#[test]
fn test_out_of_batch_regions_are_zero() {
    let input = ramp_feature_map();
    let regions = rois(&[
        [0.0, 0.0, 0.0, 4.0, 4.0],
        [1.0, 0.0, 0.0, 4.0, 4.0],
        [-1.0, 0.0, 0.0, 4.0, 4.0],
        [f64::NAN, 0.0, 0.0, 4.0, 4.0],
    ]);
    let output = ps_roi_align_forward(&input, &regions, 1.0, 1.0, 1, 2, 2, 1).unwrap();
    let values = output.to_contiguous_vec();
    assert_eq!(&values[0..4], &[5.0, 23.0, 45.0, 63.0]);
    assert!(values[4..].iter().all(|&v| v == 0.0));

    let grad = Tensor::from_vec(vec![1.0f64; 16], &[4, 1, 2, 2]).unwrap();
    let grad_input =
        ps_roi_align_backward(&grad, &regions, 1.0, 1.0, 1, 2, 2, 1, 4, 4, 4, 1).unwrap();
    let total: f64 = grad_input.to_contiguous_vec().iter().sum();
    assert!((total - 4.0).abs() < 1e-12);
}

#[test]
fn test_independent_scales() {
    // Regions given in a 2x-tall, 4x-wide image space
    let input = ramp_feature_map();
    let output = ps_roi_align_forward(
        &input,
        &rois(&[[0.0, 0.0, 0.0, 16.0, 8.0]]),
        0.5,
        0.25,
        1,
        2,
        2,
        1,
    )
    .unwrap();
    assert_tensors_close(&output, &[5.0, 23.0, 45.0, 63.0], RTOL, ATOL, "scaled region");
}

#[test]
fn test_strided_grad_matches_contiguous() {
    let mut rng = StdRng::seed_from_u64(11);
    let (num_rois, oc, ph, pw) = (5, 3, 2, 3);
    let regions = random_rois(&mut rng, num_rois, 2, 8.0);
    let params = PSRoIAlignParams::new(1.0, 1.0, oc, ph, pw, 2);
    let dims = [2, oc * ph * pw, 7, 8];

    let dense = random_tensor(&mut rng, &[num_rois, oc, ph, pw]);
    // Store the same values as [R, ph, pw, oc] and view them back as [R, oc, ph, pw]
    let mut channels_last = vec![0.0f64; dense.numel()];
    for n in 0..num_rois {
        for c in 0..oc {
            for y in 0..ph {
                for x in 0..pw {
                    channels_last[((n * ph + y) * pw + x) * oc + c] =
                        dense.get(&[n, c, y, x]).unwrap();
                }
            }
        }
    }
    let strided = Tensor::from_vec(channels_last, &[num_rois, ph, pw, oc])
        .unwrap()
        .permuted(&[0, 3, 1, 2])
        .unwrap();
    assert!(!strided.is_contiguous());
    assert!(strided.allclose(&dense, 0.0, 0.0));

    let config = PoolingConfig::sequential();
    let expected =
        ps_roi_align_backward_with_config(&dense, &regions, &params, dims, &config).unwrap();
    let actual =
        ps_roi_align_backward_with_config(&strided, &regions, &params, dims, &config).unwrap();
    assert_eq!(actual.to_contiguous_vec(), expected.to_contiguous_vec());
}

#[test]
fn test_parallel_matches_sequential() {
    let mut rng = StdRng::seed_from_u64(3);
    let dims = [3, 8, 10, 12];
    let input = random_tensor(&mut rng, &dims);
    let regions = random_rois(&mut rng, 40, 3, 12.0);
    let params = PSRoIAlignParams::new(0.9, 0.8, 2, 2, 2, 0);
    let grad = random_tensor(&mut rng, &params.output_dims(40));

    let sequential = PoolingConfig::sequential();
    let parallel = PoolingConfig {
        min_parallel_rois: 1,
        ..PoolingConfig::deterministic(6)
    };

    let out_seq = ps_roi_align_forward_with_config(&input, &regions, &params, &sequential).unwrap();
    let out_par = ps_roi_align_forward_with_config(&input, &regions, &params, &parallel).unwrap();
    assert_eq!(out_seq.to_contiguous_vec(), out_par.to_contiguous_vec());

    let gi_seq =
        ps_roi_align_backward_with_config(&grad, &regions, &params, dims, &sequential).unwrap();
    let gi_par =
        ps_roi_align_backward_with_config(&grad, &regions, &params, dims, &parallel).unwrap();
    assert!(gi_par.allclose(&gi_seq, 1e-12, 1e-12));
}

#[cfg(feature = "parallel")]
#[test]
fn test_fixed_partitions_reproducible_across_pool_sizes() {
    let mut rng = StdRng::seed_from_u64(19);
    let dims = [2, 9, 8, 8];
    let regions = random_rois(&mut rng, 64, 2, 8.0);
    let params = PSRoIAlignParams::new(1.0, 1.0, 1, 3, 3, 2);
    let grad = random_tensor(&mut rng, &params.output_dims(64));
    let config = PoolingConfig::deterministic(4);

    let run = |threads: usize| -> Vec<f64> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
            .install(|| {
                ps_roi_align_backward_with_config(&grad, &regions, &params, dims, &config)
                    .unwrap()
                    .to_contiguous_vec()
            })
    };

    let one = run(1);
    assert_eq!(one, run(3));
    assert_eq!(one, run(8));
}

#[test]
fn test_channel_mismatch_rejected() {
    let grad = Tensor::<f64>::zeros(&[1, 2, 2, 2]);
    let regions = rois(&[[0.0, 0.0, 0.0, 4.0, 4.0]]);

    let err = ps_roi_align_backward(&grad, &regions, 1.0, 1.0, 2, 2, 2, 1, 7, 4, 4, 1).unwrap_err();
    assert!(matches!(err, TensorError::ShapeMismatch { .. }));

    let err =
        ps_roi_align_forward(&ramp_feature_map(), &regions, 1.0, 1.0, 3, 1, 1, 1).unwrap_err();
    assert!(matches!(err, TensorError::ShapeMismatch { .. }));
}

#[test]
fn test_half_precision_forward() {
    let input = Tensor::from_vec(
        (0..64).map(|v| f16::from_f32(v as f32)).collect(),
        &[1, 4, 4, 4],
    )
    .unwrap();
    let regions = Tensor::from_vec(
        [0.0f32, 0.0, 0.0, 4.0, 4.0].iter().map(|&v| f16::from_f32(v)).collect(),
        &[1, 5],
    )
    .unwrap();

    let output = ps_roi_align_forward(&input, &regions, 1.0, 1.0, 1, 2, 2, 1).unwrap();
    let values: Vec<f32> = output.to_contiguous_vec().iter().map(|v| v.to_f32()).collect();
    assert_eq!(values, vec![5.0, 23.0, 45.0, 63.0]);
}

#[test]
fn test_forward_backward_adjoint_random() {
    let mut rng = StdRng::seed_from_u64(42);
    let dims = [2, 8, 6, 7];
    let params = PSRoIAlignParams::new(0.5, 0.6, 2, 2, 2, 0);
    let regions = random_rois(&mut rng, 6, 2, 12.0);
    let x = random_tensor(&mut rng, &dims);
    let direction = random_tensor(&mut rng, &dims);
    let cotangent = random_tensor(&mut rng, &params.output_dims(6));
    let config = PoolingConfig::sequential();

    let forward = |x: &Tensor<f64>| -> Result<Tensor<f64>> {
        ps_roi_align_forward_with_config(x, &regions, &params, &config)
    };
    let backward = |_x: &Tensor<f64>, g: &Tensor<f64>| -> Result<Tensor<f64>> {
        ps_roi_align_backward_with_config(g, &regions, &params, dims, &config)
    };

    let result = check_adjoint(
        &x,
        &cotangent,
        &direction,
        forward,
        backward,
        &GradientCheckConfig::strict(),
    )
    .unwrap();
    assert!(result.is_ok(), "{}", result.summary());
}

#[test]
fn test_full_gradient_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(5);
    let dims = [1, 4, 3, 3];
    let params = PSRoIAlignParams::new(1.0, 1.0, 1, 2, 2, 2);
    let regions = rois(&[[0.0, -0.4, 0.2, 2.6, 2.1], [0.0, 1.0, 1.0, 1.0, 3.5]]);
    let x = random_tensor(&mut rng, &dims);
    let cotangent = random_tensor(&mut rng, &params.output_dims(2));
    let config = PoolingConfig::sequential();

    let result = check_gradients(
        &x,
        &cotangent,
        |x| ps_roi_align_forward_with_config(x, &regions, &params, &config),
        |_, g| ps_roi_align_backward_with_config(g, &regions, &params, dims, &config),
        &GradientCheckConfig::default(),
    )
    .unwrap();
    assert!(result.is_ok(), "{}", result.summary());
    assert_eq!(result.num_elements_checked, 36);
}
