//! Region geometry and bilinear sampling shared by forward and backward.

use num_traits::{Float, FromPrimitive};

/// Scalars per region row: `[batch_index, x1, y1, x2, y2]`
pub const ROI_FIELDS: usize = 5;

#[inline]
pub(crate) fn cast<T: Float + FromPrimitive>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::zero)
}

#[inline]
pub(crate) fn cast_usize<T: Float + FromPrimitive>(value: usize) -> T {
    T::from_usize(value).unwrap_or_else(T::zero)
}

/// Parameters of a position-sensitive ROI Align call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PSRoIAlignParams {
    /// Vertical scale mapping region coordinates into feature-map rows
    pub scale_h: f32,
    /// Horizontal scale mapping region coordinates into feature-map columns
    pub scale_w: f32,
    pub out_channels: usize,
    pub pooled_height: usize,
    pub pooled_width: usize,
    /// Samples per bin edge; `<= 0` derives it per region from the region size
    pub sampling_ratio: i32,
}

impl PSRoIAlignParams {
    pub fn new(
        scale_h: f32,
        scale_w: f32,
        out_channels: usize,
        pooled_height: usize,
        pooled_width: usize,
        sampling_ratio: i32,
    ) -> Self {
        Self {
            scale_h,
            scale_w,
            out_channels,
            pooled_height,
            pooled_width,
            sampling_ratio,
        }
    }

    /// Output bins per channel group
    pub fn bins(&self) -> usize {
        self.pooled_height * self.pooled_width
    }

    /// Input channel count the feature map must have
    pub fn input_channels(&self) -> usize {
        self.out_channels * self.bins()
    }

    /// Elements of pooled output produced per region
    pub fn region_len(&self) -> usize {
        self.input_channels()
    }

    /// Pooled output shape for `num_rois` regions
    pub fn output_dims(&self, num_rois: usize) -> [usize; 4] {
        [
            num_rois,
            self.out_channels,
            self.pooled_height,
            self.pooled_width,
        ]
    }

    /// Input channel read by output channel `c` at bin `(ph, pw)`
    #[inline]
    pub fn input_channel(&self, c: usize, ph: usize, pw: usize) -> usize {
        c * self.bins() + ph * self.pooled_width + pw
    }
}

/// Geometry of one region mapped into feature-map space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiGeometry<T> {
    /// Image the region samples from; `None` when the batch index is
    /// negative, non-finite or past the batch.
    pub batch_index: Option<usize>,
    pub start_h: T,
    pub start_w: T,
    pub bin_size_h: T,
    pub bin_size_w: T,
    pub grid_h: usize,
    pub grid_w: usize,
    /// Samples averaged per bin (`grid_h * grid_w`)
    pub count: T,
}

impl<T: Float + FromPrimitive> RoiGeometry<T> {
    /// Map one `[batch_index, x1, y1, x2, y2]` row into feature-map space.
    ///
    /// Coordinates are scaled without rounding. Spans shorter than one
    /// feature-map cell (including inverted boxes) are widened to exactly 1.0.
    pub fn new(roi: &[T], params: &PSRoIAlignParams, batch_size: usize) -> Self {
        let scale_h = cast::<T>(params.scale_h as f64);
        let scale_w = cast::<T>(params.scale_w as f64);
        let pooled_h = cast_usize::<T>(params.pooled_height);
        let pooled_w = cast_usize::<T>(params.pooled_width);

        let batch_index = roi[0].to_usize().filter(|&b| b < batch_size);

        let start_w = roi[1] * scale_w;
        let start_h = roi[2] * scale_h;
        let end_w = roi[3] * scale_w;
        let end_h = roi[4] * scale_h;

        let roi_width = (end_w - start_w).max(T::one());
        let roi_height = (end_h - start_h).max(T::one());

        let grid_h = sampling_grid(params.sampling_ratio, roi_height / pooled_h);
        let grid_w = sampling_grid(params.sampling_ratio, roi_width / pooled_w);

        Self {
            batch_index,
            start_h,
            start_w,
            bin_size_h: roi_height / pooled_h,
            bin_size_w: roi_width / pooled_w,
            grid_h,
            grid_w,
            count: cast_usize(grid_h * grid_w),
        }
    }

    /// Continuous row of sample `iy` inside bin row `ph`
    #[inline]
    pub fn sample_y(&self, ph: usize, iy: usize) -> T {
        self.start_h
            + cast_usize::<T>(ph) * self.bin_size_h
            + cast::<T>(iy as f64 + 0.5) * self.bin_size_h / cast_usize(self.grid_h)
    }

    /// Continuous column of sample `ix` inside bin column `pw`
    #[inline]
    pub fn sample_x(&self, pw: usize, ix: usize) -> T {
        self.start_w
            + cast_usize::<T>(pw) * self.bin_size_w
            + cast::<T>(ix as f64 + 0.5) * self.bin_size_w / cast_usize(self.grid_w)
    }
}

/// Samples per bin edge: the explicit ratio, or `ceil(bin extent)` clamped to at least 1.
fn sampling_grid<T: Float>(sampling_ratio: i32, bin_extent: T) -> usize {
    if sampling_ratio > 0 {
        sampling_ratio as usize
    } else {
        bin_extent.ceil().to_usize().unwrap_or(1).max(1)
    }
}

/// Lattice corners and weights of one bilinear sample.
///
/// Weights are ordered `(y_low, x_low)`, `(y_low, x_high)`, `(y_high, x_low)`,
/// `(y_high, x_high)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilinearCorners<T> {
    pub y_low: usize,
    pub y_high: usize,
    pub x_low: usize,
    pub x_high: usize,
    pub weights: [T; 4],
}

impl<T: Copy> BilinearCorners<T> {
    /// Linear offsets of the four corners inside one `height x width` plane
    #[inline]
    pub fn offsets(&self, width: usize) -> [usize; 4] {
        [
            self.y_low * width + self.x_low,
            self.y_low * width + self.x_high,
            self.y_high * width + self.x_low,
            self.y_high * width + self.x_high,
        ]
    }
}

/// Bilinear corners for the continuous point `(y, x)` on a `height x width` plane.
///
/// Returns `None` for an empty sample: any coordinate at or beyond `-1` or at
/// or beyond the plane extent (NaN included). Coordinates in `(-1, 0)` are
/// read as 0. On the last row or column both corners collapse onto that
/// index and the fractional offset becomes 0.
#[inline]
pub fn bilinear_corners<T: Float + FromPrimitive>(
    height: usize,
    width: usize,
    y: T,
    x: T,
) -> Option<BilinearCorners<T>> {
    if height == 0 || width == 0 {
        return None;
    }
    let neg_one = -T::one();
    let inside = y > neg_one
        && y < cast_usize(height)
        && x > neg_one
        && x < cast_usize(width);
    if !inside {
        return None;
    }

    let (y_low, y_high, ly) = axis_corners(y.max(T::zero()), height);
    let (x_low, x_high, lx) = axis_corners(x.max(T::zero()), width);
    let hy = T::one() - ly;
    let hx = T::one() - lx;

    Some(BilinearCorners {
        y_low,
        y_high,
        x_low,
        x_high,
        weights: [hy * hx, hy * lx, ly * hx, ly * lx],
    })
}

/// Low index, high index and fractional offset along one axis of extent `size`.
#[inline]
fn axis_corners<T: Float + FromPrimitive>(coord: T, size: usize) -> (usize, usize, T) {
    let low = coord.to_usize().unwrap_or(0);
    if low >= size - 1 {
        (size - 1, size - 1, T::zero())
    } else {
        (low, low + 1, coord - cast_usize(low))
    }
}
