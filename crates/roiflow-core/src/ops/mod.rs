pub mod pooling;

pub use pooling::{
    ps_roi_align_backward, ps_roi_align_backward_dyn, ps_roi_align_backward_with_config,
    ps_roi_align_forward, ps_roi_align_forward_dyn, ps_roi_align_forward_with_config,
    FloatTensor, PSRoIAlignParams,
};
