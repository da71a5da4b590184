//! Core Tensor Structure and Properties
//!
//! This module contains the tensor structure and the property, element and
//! stride accessors the operators rely on. Storage is always CPU-resident.

use crate::{DType, Result, Shape, TensorError};
use ndarray::{ArrayD, IxDyn};
use num_traits::Float;
use std::borrow::Cow;

/// Dense CPU tensor backed by an `ndarray` array.
///
/// The backing array may be a non-standard layout (for example after
/// [`Tensor::permuted`]); accessors that require row-major contiguity say so.
#[derive(Debug, Clone)]
pub struct Tensor<T> {
    pub(in crate::tensor) data: ArrayD<T>,
    pub(in crate::tensor) shape: Shape,
}

/// Borrowed rank-4 view addressed through explicit per-axis element strides.
///
/// Element `(n, c, h, w)` lives at
/// `data[offset + n*strides[0] + c*strides[1] + h*strides[2] + w*strides[3]]`.
#[derive(Debug, Clone, Copy)]
pub struct StridedView<'a, T> {
    pub data: &'a [T],
    pub offset: usize,
    pub strides: [usize; 4],
}

impl<'a, T: Copy> StridedView<'a, T> {
    /// View over a contiguous row-major `[n, c, h, w]` buffer
    pub fn contiguous(data: &'a [T], dims: [usize; 4]) -> Self {
        let [_, c, h, w] = dims;
        Self {
            data,
            offset: 0,
            strides: [c * h * w, h * w, w, 1],
        }
    }

    /// Read element `(n, c, h, w)`
    #[inline]
    pub fn at(&self, n: usize, c: usize, h: usize, w: usize) -> T {
        self.data[self.offset
            + n * self.strides[0]
            + c * self.strides[1]
            + h * self.strides[2]
            + w * self.strides[3]]
    }
}

impl<T> Tensor<T> {
    /// Get the shape of the tensor
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Get the data type of the tensor
    pub fn dtype(&self) -> DType
    where
        T: 'static,
    {
        crate::dtype_from_type::<T>()
    }

    /// Get the total number of elements
    pub fn numel(&self) -> usize {
        self.shape.size()
    }

    /// Get the number of dimensions (rank)
    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Check if tensor is empty (has no elements)
    pub fn is_empty(&self) -> bool {
        self.shape.size() == 0
    }

    /// Get memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.shape.size() * std::mem::size_of::<T>()
    }

    /// Check if tensor data is row-major contiguous in memory
    pub fn is_contiguous(&self) -> bool {
        self.data.is_standard_layout()
    }

    /// Per-axis element strides of the backing array
    pub fn strides(&self) -> Vec<isize> {
        self.data.strides().to_vec()
    }

    /// Get the underlying data as a row-major slice (contiguous tensors only)
    pub fn as_slice(&self) -> Option<&[T]> {
        self.data.as_slice()
    }

    /// Get the value at a specific index
    pub fn get(&self, index: &[usize]) -> Option<T>
    where
        T: Clone,
    {
        if index.len() != self.data.ndim() {
            return None;
        }
        self.data.get(IxDyn(index)).cloned()
    }

    /// Copy the elements out in logical row-major order
    pub fn to_contiguous_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        match self.data.as_slice() {
            Some(slice) => slice.to_vec(),
            None => self.data.iter().cloned().collect(),
        }
    }

    /// Borrow the row-major elements, copying only when the layout is not standard
    pub fn contiguous_data(&self) -> Cow<'_, [T]>
    where
        T: Clone,
    {
        match self.data.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(self.data.iter().cloned().collect()),
        }
    }

    /// Reorder axes without copying; the result is generally not contiguous
    pub fn permuted(&self, axes: &[usize]) -> Result<Self>
    where
        T: Clone,
    {
        let rank = self.rank();
        let mut seen = vec![false; rank];
        let is_permutation = axes.len() == rank
            && axes
                .iter()
                .all(|&a| a < rank && !std::mem::replace(&mut seen[a], true));
        if !is_permutation {
            return Err(TensorError::invalid_argument_op(
                "permuted",
                &format!("axes {axes:?} are not a permutation of 0..{rank}"),
            ));
        }

        let data = self.data.clone().permuted_axes(IxDyn(axes));
        let shape = Shape::from_slice(data.shape());
        Ok(Self { data, shape })
    }

    /// Get tensor summary statistics as a formatted string
    pub fn summary(&self) -> String {
        format!(
            "Tensor<{}>: shape={}, numel={}, memory={}B, contiguous={}",
            std::any::type_name::<T>(),
            self.shape,
            self.shape.size(),
            self.memory_usage(),
            self.is_contiguous()
        )
    }
}

impl<T: Copy> Tensor<T> {
    /// Rank-4 strided view over the backing memory.
    ///
    /// Available when the array is a dense permutation of its memory with
    /// non-negative strides; `None` otherwise (callers fall back to
    /// [`Tensor::to_contiguous_vec`]).
    pub fn try_strided_view(&self) -> Option<StridedView<'_, T>> {
        self.shape.as_nchw()?;
        let strides = self.data.strides();
        if strides.iter().any(|&s| s < 0) {
            return None;
        }
        let data = self.data.as_slice_memory_order()?;
        Some(StridedView {
            data,
            offset: 0,
            strides: [
                strides[0] as usize,
                strides[1] as usize,
                strides[2] as usize,
                strides[3] as usize,
            ],
        })
    }
}

impl<T: Float> Tensor<T> {
    /// Element-wise closeness check; tensors of different shape are never close
    pub fn allclose(&self, other: &Self, rtol: T, atol: T) -> bool {
        if self.shape != other.shape {
            return false;
        }
        self.data
            .iter()
            .zip(other.data.iter())
            .all(|(&a, &b)| (a - b).abs() <= atol + rtol * b.abs())
    }
}
