use super::Rect;
use crate::common::*;

/// Bounding box in TLHW format, the layout used by pixel annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TLHW<T> {
    pub(crate) t: T,
    pub(crate) l: T,
    pub(crate) h: T,
    pub(crate) w: T,
}

impl<T> TLHW<T>
where
    T: Float,
{
    /// Builds a box from the `[x, y, w, h]` layout used by annotation files.
    pub fn try_from_xywh(xywh: [T; 4]) -> Result<Self> {
        let [x, y, w, h] = xywh;
        Self::try_from_tlhw([y, x, h, w])
    }

    /// Whether both sides are strictly positive.
    pub fn has_positive_area(&self) -> bool {
        self.h > T::zero() && self.w > T::zero()
    }
}

impl<T> Rect for TLHW<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn t(&self) -> Self::Type {
        self.t
    }

    fn l(&self) -> Self::Type {
        self.l
    }

    fn h(&self) -> Self::Type {
        self.h
    }

    fn w(&self) -> Self::Type {
        self.w
    }

    fn cy(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.t + self.h / two
    }

    fn cx(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.l + self.w / two
    }

    fn try_from_tlhw(tlhw: [Self::Type; 4]) -> Result<Self> {
        let [t, l, h, w] = tlhw;
        let zero = T::zero();
        ensure!(
            h >= zero && w >= zero,
            "box height and width must be non-negative"
        );
        Ok(Self { t, l, h, w })
    }

    fn try_from_cycxhw(cycxhw: [Self::Type; 4]) -> Result<Self> {
        let [cy, cx, h, w] = cycxhw;
        let two = T::one() + T::one();
        Self::try_from_tlhw([cy - h / two, cx - w / two, h, w])
    }
}
