use crate::common::*;

/// Height and width of an image, a grid or a box shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HW<T> {
    pub(crate) h: T,
    pub(crate) w: T,
}

impl<T> HW<T> {
    pub fn try_cast<U>(self) -> Option<HW<U>>
    where
        T: ToPrimitive,
        U: NumCast,
    {
        Some(HW {
            h: U::from(self.h)?,
            w: U::from(self.w)?,
        })
    }

    pub fn cast<U>(self) -> HW<U>
    where
        T: ToPrimitive,
        U: NumCast,
    {
        self.try_cast().unwrap()
    }
}

impl<T> HW<T>
where
    T: Num + PartialOrd + Copy,
{
    pub fn try_from_hw(hw: [T; 2]) -> Result<Self> {
        let [h, w] = hw;
        let zero = T::zero();
        ensure!(
            h >= zero && w >= zero,
            "height and width parameters must be non-negative"
        );
        Ok(Self { h, w })
    }

    /// Like [HW::try_from_hw], but rejects zero sides as well.
    pub fn try_positive(hw: [T; 2]) -> Result<Self> {
        let [h, w] = hw;
        let zero = T::zero();
        ensure!(
            h > zero && w > zero,
            "height and width parameters must be positive"
        );
        Ok(Self { h, w })
    }

    pub fn from_hw(hw: [T; 2]) -> Self {
        Self::try_from_hw(hw).unwrap()
    }

    pub fn area(&self) -> T {
        self.h * self.w
    }

    pub fn h(&self) -> T {
        self.h
    }

    pub fn w(&self) -> T {
        self.w
    }

    pub fn hw(&self) -> [T; 2] {
        [self.h, self.w]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn size_area() {
        let size = HW::from_hw([3.0, 2.0]);
        let area: f64 = size.area();
        assert_abs_diff_eq!(area, 6.0);
    }

    #[test]
    fn positive_size() {
        assert!(HW::try_positive([0usize, 4]).is_err());
        assert!(HW::try_from_hw([0usize, 4]).is_ok());
        assert_eq!(HW::try_positive([30usize, 40]).unwrap().hw(), [30, 40]);
    }
}
