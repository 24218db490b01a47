//! Safe bounding box types and functions.
//!
//! Boxes follow the inclusive pixel convention: a box with top `t` and
//! height `h` covers the rows `t..=t + h - 1`.

mod common;

pub use rect::*;
pub mod rect;

pub use tlhw::*;
pub mod tlhw;

pub use cycxhw::*;
pub mod cycxhw;

pub use hw::*;
pub mod hw;

pub mod prelude {
    pub use crate::rect::{Rect, RectFloat, RectNum};
}
