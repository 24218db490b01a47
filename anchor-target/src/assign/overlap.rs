use crate::common::*;

/// Overlaps between anchors and boxes, one row per anchor and one column
/// per box.
#[derive(Debug, Clone)]
pub struct OverlapMatrix {
    values: Array2<f64>,
}

impl OverlapMatrix {
    pub fn compute<F>(anchors: &[TLHW<f64>], truths: &[TLHW<f64>], measure: F) -> Self
    where
        F: Fn(&TLHW<f64>, &TLHW<f64>) -> f64,
    {
        let values = Array2::from_shape_fn((anchors.len(), truths.len()), |(anchor, truth)| {
            measure(&anchors[anchor], &truths[truth])
        });
        Self { values }
    }

    pub fn num_anchors(&self) -> usize {
        self.values.nrows()
    }

    pub fn num_truths(&self) -> usize {
        self.values.ncols()
    }

    pub fn get(&self, anchor: usize, truth: usize) -> Option<f64> {
        self.values.get((anchor, truth)).cloned()
    }

    /// Overwrites one entry.
    pub fn force(&mut self, anchor: usize, truth: usize, value: f64) {
        self.values[(anchor, truth)] = value;
    }

    /// The anchor overlapping the box the most. Ties go to the lowest anchor.
    pub fn best_anchor(&self, truth: usize) -> Option<usize> {
        if truth >= self.num_truths() {
            return None;
        }
        let (anchor, _) = first_max(self.values.column(truth).iter().cloned())?;
        Some(anchor)
    }

    /// The box overlapping the anchor the most, with its overlap. Ties go to
    /// the lowest box index.
    pub fn best_truth(&self, anchor: usize) -> Option<(usize, f64)> {
        if anchor >= self.num_anchors() {
            return None;
        }
        first_max(self.values.row(anchor).iter().cloned())
    }

    /// The highest overlap of the anchor with any box.
    pub fn max_overlap(&self, anchor: usize) -> Option<f64> {
        let (_, value) = self.best_truth(anchor)?;
        Some(value)
    }
}

fn first_max<I>(values: I) -> Option<(usize, f64)>
where
    I: IntoIterator<Item = f64>,
{
    values
        .into_iter()
        .enumerate()
        .fold(None, |best, (index, value)| match best {
            Some((_, best_value)) if !(value > best_value) => best,
            _ => Some((index, value)),
        })
}
