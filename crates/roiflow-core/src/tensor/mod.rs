//! Tensor Module
//!
//! A thin CPU tensor container over `ndarray::ArrayD`, carrying the shape,
//! stride and element-type metadata the pooling operators consume.
//!
//! - **core**: Tensor structure, properties and strided access
//! - **creation**: Tensor constructors

pub mod core;
pub mod creation;

pub use core::{StridedView, Tensor};
