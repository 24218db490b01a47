use super::{CyCxHW, HW, TLHW};
use crate::common::*;

/// The generic rectangle.
///
/// Implementors describe the top-left corner and the extent of a box. The
/// bottom and right edges derived in [RectNum] are inclusive pixel indices.
pub trait Rect {
    type Type;

    fn t(&self) -> Self::Type;
    fn l(&self) -> Self::Type;
    fn h(&self) -> Self::Type;
    fn w(&self) -> Self::Type;
    fn cy(&self) -> Self::Type;
    fn cx(&self) -> Self::Type;

    fn try_from_tlhw(tlhw: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    fn try_from_cycxhw(cycxhw: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;
}

pub trait RectNum: Rect
where
    Self::Type: Num + PartialOrd + Copy,
{
    fn from_tlhw(tlhw: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_tlhw(tlhw).unwrap()
    }

    fn from_cycxhw(cycxhw: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_cycxhw(cycxhw).unwrap()
    }

    /// The last row covered by the box.
    fn b(&self) -> Self::Type {
        self.t() + self.h() - Self::Type::one()
    }

    /// The last column covered by the box.
    fn r(&self) -> Self::Type {
        self.l() + self.w() - Self::Type::one()
    }

    fn tlhw(&self) -> [Self::Type; 4] {
        [self.t(), self.l(), self.h(), self.w()]
    }

    fn cycxhw(&self) -> [Self::Type; 4] {
        [self.cy(), self.cx(), self.h(), self.w()]
    }

    fn hw(&self) -> [Self::Type; 2] {
        [self.h(), self.w()]
    }

    fn size(&self) -> HW<Self::Type> {
        HW {
            h: self.h(),
            w: self.w(),
        }
    }

    fn to_tlhw(&self) -> TLHW<Self::Type> {
        TLHW {
            t: self.t(),
            l: self.l(),
            h: self.h(),
            w: self.w(),
        }
    }

    fn to_cycxhw(&self) -> CyCxHW<Self::Type> {
        CyCxHW {
            cy: self.cy(),
            cx: self.cx(),
            h: self.h(),
            w: self.w(),
        }
    }

    fn area(&self) -> Self::Type {
        self.h() * self.w()
    }
}

pub trait RectFloat: RectNum
where
    Self::Type: Float,
{
    /// Overlapping extent of the two boxes along the vertical and
    /// horizontal axes, clamped to zero.
    fn intersection_hw_with<R>(&self, other: &R) -> [Self::Type; 2]
    where
        R: RectNum<Type = Self::Type>,
    {
        let zero = Self::Type::zero();
        let one = Self::Type::one();
        let h = self.b().min(other.b()) - self.t().max(other.t()) + one;
        let w = self.r().min(other.r()) - self.l().max(other.l()) + one;
        [h.max(zero), w.max(zero)]
    }

    fn intersection_area_with<R>(&self, other: &R) -> Self::Type
    where
        R: RectNum<Type = Self::Type>,
    {
        let [h, w] = self.intersection_hw_with(other);
        h * w
    }

    /// Intersection over union. Degenerate boxes yield zero.
    ///
    /// Extents count pixels inclusively, so the intersection height is
    /// `min(b) - max(t) + 1`. Tools that measure `min(b) - max(t)` with the
    /// same inclusive `b` report a smaller overlap, and labels derived from
    /// this function will not match theirs on the same frames.
    fn iou_with<R>(&self, other: &R) -> Self::Type
    where
        R: RectNum<Type = Self::Type>,
    {
        let inter_area = self.intersection_area_with(other);
        let union_area = self.area() + other.area() - inter_area;
        safe_ratio(inter_area, union_area)
    }

    /// The larger of the IoU and the fraction of `self` covered by `other`.
    ///
    /// It flags boxes lying mostly inside a much larger box, which plain IoU
    /// scores low.
    fn containment_iou_with<R>(&self, other: &R) -> Self::Type
    where
        R: RectNum<Type = Self::Type>,
    {
        let inter_area = self.intersection_area_with(other);
        let union_area = self.area() + other.area() - inter_area;
        let iou = safe_ratio(inter_area, union_area);
        let coverage = safe_ratio(inter_area, self.area());
        iou.max(coverage)
    }

    /// Whether any edge of the box lies outside `[0, size)` on either axis.
    ///
    /// The bottom edge is the inclusive `b`, so a box ending on row `H - 1`
    /// stays inside. Checking `t + h >= H` instead drops one more row of
    /// anchors.
    fn crosses_boundary(&self, size: &HW<Self::Type>) -> bool {
        let zero = Self::Type::zero();
        !(self.t() >= zero && self.l() >= zero && self.b() < size.h() && self.r() < size.w())
    }
}

impl<T> RectNum for T
where
    T: Rect,
    T::Type: Num + PartialOrd + Copy,
{
}

impl<T> RectFloat for T
where
    T: Rect,
    T::Type: Float,
{
}

fn safe_ratio<T>(num: T, denom: T) -> T
where
    T: Float,
{
    if denom > T::zero() {
        let ratio = num / denom;
        if ratio.is_finite() {
            return ratio;
        }
    }
    T::zero()
}
