// Pooling layers organized by type

pub mod roi;

pub use roi::{PSROIAlign2D, PSROIAlignContext};
