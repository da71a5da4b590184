//! Pooling operations for region-based detection heads
//!
//! This module provides position-sensitive ROI Align forward and backward
//! passes together with the sampling helpers they share.

pub mod ps_roi_align;

// Re-export commonly used functions
pub use ps_roi_align::{
    ps_roi_align_backward, ps_roi_align_backward_dyn, ps_roi_align_backward_with_config,
    ps_roi_align_forward, ps_roi_align_forward_dyn, ps_roi_align_forward_with_config,
    FloatTensor, PSRoIAlignParams,
};
