#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Floating-point element types the pooling operators dispatch over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum DType {
    Float16,  // Half precision IEEE 754-2008
    BFloat16, // Brain floating point (Google's bfloat16)
    Float32,
    Float64,
}

impl DType {
    pub fn size(&self) -> usize {
        match self {
            DType::Float16 => 2,
            DType::BFloat16 => 2,
            DType::Float32 => 4,
            DType::Float64 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DType::Float16 => "float16",
            DType::BFloat16 => "bfloat16",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    /// Whether the type is one of the 16-bit reduced-precision formats
    pub fn is_half(&self) -> bool {
        matches!(self, DType::Float16 | DType::BFloat16)
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Get DType from Rust type
pub fn dtype_from_type<T: 'static>() -> DType {
    use half::{bf16, f16};
    use std::any::TypeId;

    if TypeId::of::<T>() == TypeId::of::<f16>() {
        DType::Float16
    } else if TypeId::of::<T>() == TypeId::of::<bf16>() {
        DType::BFloat16
    } else if TypeId::of::<T>() == TypeId::of::<f64>() {
        DType::Float64
    } else {
        // Default to Float32 for f32 and anything unrecognised
        DType::Float32
    }
}
