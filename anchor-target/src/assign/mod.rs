//! Labeling of anchors against ground truth boxes.

mod assigner;
mod config;
mod overlap;
mod result;

pub use assigner::*;
pub use config::*;
pub use overlap::*;
pub use result::*;
