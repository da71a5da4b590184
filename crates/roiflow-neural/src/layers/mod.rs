pub mod pooling;

pub use pooling::{PSROIAlign2D, PSROIAlignContext};
