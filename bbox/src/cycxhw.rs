use super::Rect;
use crate::common::*;

/// Bounding box in CyCxHW format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CyCxHW<T> {
    pub(crate) cy: T,
    pub(crate) cx: T,
    pub(crate) h: T,
    pub(crate) w: T,
}

impl<T> Rect for CyCxHW<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn t(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.cy - self.h / two
    }

    fn l(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.cx - self.w / two
    }

    fn h(&self) -> Self::Type {
        self.h
    }

    fn w(&self) -> Self::Type {
        self.w
    }

    fn cy(&self) -> Self::Type {
        self.cy
    }

    fn cx(&self) -> Self::Type {
        self.cx
    }

    fn try_from_tlhw(tlhw: [T; 4]) -> Result<Self> {
        let [t, l, h, w] = tlhw;
        let two = T::one() + T::one();
        Self::try_from_cycxhw([t + h / two, l + w / two, h, w])
    }

    fn try_from_cycxhw(cycxhw: [T; 4]) -> Result<Self> {
        let [cy, cx, h, w] = cycxhw;
        let zero = T::zero();
        ensure!(
            h >= zero && w >= zero,
            "box height and width must be non-negative"
        );

        Ok(Self { cy, cx, h, w })
    }
}
