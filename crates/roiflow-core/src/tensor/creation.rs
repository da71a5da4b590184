//! Tensor Creation and Construction

use super::core::Tensor;
use crate::{Result, Shape, TensorError};
use ndarray::{ArrayD, IxDyn};
use num_traits::Zero;

impl<T: Clone> Tensor<T> {
    /// Create a tensor filled with zeros
    pub fn zeros(shape: &[usize]) -> Self
    where
        T: Zero,
    {
        Self {
            data: ArrayD::zeros(IxDyn(shape)),
            shape: Shape::from_slice(shape),
        }
    }

    /// Create a tensor filled with a constant value
    pub fn full(shape: &[usize], value: T) -> Self {
        Self {
            data: ArrayD::from_elem(IxDyn(shape), value),
            shape: Shape::from_slice(shape),
        }
    }

    /// Create a tensor from a row-major data vector with the given shape
    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        let total_elements: usize = shape.iter().product();
        if data.len() != total_elements {
            return Err(TensorError::invalid_shape_simple(format!(
                "Data length {} does not match shape {:?} (expected {} elements)",
                data.len(),
                shape,
                total_elements
            )));
        }

        let array = ArrayD::from_shape_vec(IxDyn(shape), data)
            .map_err(|e| TensorError::invalid_shape_simple(e.to_string()))?;

        Ok(Self {
            data: array,
            shape: Shape::from_slice(shape),
        })
    }
}
