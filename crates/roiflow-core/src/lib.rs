#![allow(clippy::result_large_err)]

pub mod config;
pub mod dtype;
pub mod error;
pub mod numerical_gradient;
pub mod ops;
pub mod shape;
pub mod tensor;

pub use config::{get_pooling_config, set_pooling_config, PoolingConfig, PoolingConfigScope};
pub use dtype::{dtype_from_type, DType};
pub use error::{ErrorContext, Result, TensorError};
pub use half::{bf16, f16};
pub use numerical_gradient::{
    check_adjoint, check_gradients, GradientCheckConfig, GradientCheckResult,
    NumericalGradientChecker,
};
pub use ops::{
    ps_roi_align_backward, ps_roi_align_backward_dyn, ps_roi_align_backward_with_config,
    ps_roi_align_forward, ps_roi_align_forward_dyn, ps_roi_align_forward_with_config,
    FloatTensor, PSRoIAlignParams,
};
pub use shape::Shape;
pub use tensor::{StridedView, Tensor};
