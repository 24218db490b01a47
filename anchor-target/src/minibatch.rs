//! Training minibatch sampling and dense target tensors.

use crate::{
    anchor::{AnchorIndex, GridGeometry},
    assign::AssignmentResult,
    common::*,
};
use rand::seq::index;

/// Draws a balanced subset of labeled anchors for one training step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinibatchSampler {
    size: usize,
}

impl MinibatchSampler {
    pub fn new(size: usize) -> Result<Self> {
        ensure!(size >= 2, "minibatch size must be at least 2, but get {}", size);
        Ok(Self { size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Keeps at most half of the minibatch from each label, chosen uniformly
    /// without replacement. Kept anchors stay in scan order.
    pub fn sample<R>(&self, result: &AssignmentResult, rng: &mut R) -> AssignmentResult
    where
        R: Rng + ?Sized,
    {
        let half = self.size / 2;

        let negatives: IndexSet<_> = pick(rng, result.negatives.len(), half)
            .into_iter()
            .filter_map(|nth| result.negatives.get_index(nth).cloned())
            .collect();

        let (positives, regression): (IndexMap<_, _>, IndexMap<_, _>) =
            pick(rng, result.positives.len(), half)
                .into_iter()
                .filter_map(|nth| {
                    let (&anchor, &truth_index) = result.positives.get_index(nth)?;
                    let delta = *result.regression.get(&anchor)?;
                    Some(((anchor, truth_index), (anchor, delta)))
                })
                .unzip();

        AssignmentResult {
            negatives,
            positives,
            regression,
        }
    }
}

fn pick<R>(rng: &mut R, length: usize, amount: usize) -> Vec<usize>
where
    R: Rng + ?Sized,
{
    let mut picked = index::sample(rng, length, amount.min(length)).into_vec();
    picked.sort_unstable();
    picked
}

/// Assignment targets laid out on the output grid.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTargets {
    /// `[rows, cols, shapes, 2]` one-hot labels. Channel 0 marks negatives
    /// and channel 1 marks positives. Excluded anchors are all zero.
    pub classification: Array4<f32>,
    /// `[rows, cols, shapes, 4]` regression targets in `dy, dx, dh, dw`
    /// order, zero for non-positive anchors.
    pub regression: Array4<f32>,
}

impl DenseTargets {
    pub fn from_result(
        result: &AssignmentResult,
        geometry: &GridGeometry,
        num_shapes: usize,
    ) -> Result<Self> {
        let (rows, cols) = (geometry.rows(), geometry.cols());
        let check = |anchor: &AnchorIndex| -> Result<()> {
            ensure!(
                anchor.row < rows && anchor.col < cols && anchor.shape < num_shapes,
                "anchor {} is out of the {}x{}x{} grid",
                anchor,
                rows,
                cols,
                num_shapes
            );
            Ok(())
        };

        let mut classification = Array4::zeros((rows, cols, num_shapes, 2));
        let mut regression = Array4::zeros((rows, cols, num_shapes, 4));

        for anchor in &result.negatives {
            check(anchor)?;
            let AnchorIndex { row, col, shape } = *anchor;
            classification[[row, col, shape, 0]] = 1.0;
        }

        for anchor in result.positives.keys() {
            check(anchor)?;
            let AnchorIndex { row, col, shape } = *anchor;
            classification[[row, col, shape, 1]] = 1.0;

            let delta = result
                .regression
                .get(anchor)
                .ok_or_else(|| format_err!("positive anchor {} has no regression target", anchor))?;
            delta
                .to_array()
                .iter()
                .enumerate()
                .for_each(|(channel, &value)| {
                    regression[[row, col, shape, channel]] = value as f32;
                });
        }

        Ok(Self {
            classification,
            regression,
        })
    }
}

/// Label counts accumulated over frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentStats {
    pub frames: usize,
    pub positives: usize,
    pub negatives: usize,
}

impl AssignmentStats {
    pub fn add(&mut self, result: &AssignmentResult) {
        self.frames += 1;
        self.positives += result.num_positives();
        self.negatives += result.num_negatives();
    }

    pub fn merge(&self, other: &Self) -> Self {
        Self {
            frames: self.frames + other.frames,
            positives: self.positives + other.positives,
            negatives: self.negatives + other.negatives,
        }
    }

    /// Fraction of labeled anchors that are positive, or zero if nothing is
    /// labeled.
    pub fn positive_ratio(&self) -> f64 {
        let total = self.positives + self.negatives;
        if total == 0 {
            0.0
        } else {
            self.positives as f64 / total as f64
        }
    }
}

impl<'a> FromIterator<&'a AssignmentResult> for AssignmentStats {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = &'a AssignmentResult>,
    {
        let mut stats = Self::default();
        iter.into_iter().for_each(|result| stats.add(result));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{anchor::GridGeometryInit, regression::BoxDelta};
    use rand::rngs::StdRng;

    fn result(num_negatives: usize, num_positives: usize) -> AssignmentResult {
        let mut result = AssignmentResult::default();
        (0..num_negatives).for_each(|col| {
            result.negatives.insert(AnchorIndex::new(0, col, 0));
        });
        (0..num_positives).for_each(|col| {
            let anchor = AnchorIndex::new(1, col, 0);
            let delta = BoxDelta {
                dy: col as f64,
                dx: 0.0,
                dh: 0.0,
                dw: 0.0,
            };
            result.positives.insert(anchor, col);
            result.regression.insert(anchor, delta);
        });
        result
    }

    #[test]
    fn sample_caps_each_label() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(7);
        let sampler = MinibatchSampler::new(8)?;
        let input = result(100, 10);
        let sampled = sampler.sample(&input, &mut rng);

        assert_eq!(sampled.num_negatives(), 4);
        assert_eq!(sampled.num_positives(), 4);
        assert!(sampled.negatives.iter().all(|anchor| input.negatives.contains(anchor)));
        sampled.positives.iter().for_each(|(anchor, &truth_index)| {
            assert_eq!(input.positives[anchor], truth_index);
            assert_eq!(sampled.regression[anchor], input.regression[anchor]);
        });
        assert!(sampled.negatives.iter().tuple_windows().all(|(lhs, rhs)| lhs < rhs));
        Ok(())
    }

    #[test]
    fn sample_keeps_short_labels() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(7);
        let sampled = MinibatchSampler::new(64)?.sample(&result(5, 2), &mut rng);
        assert_eq!(sampled, result(5, 2));
        Ok(())
    }

    #[test]
    fn reject_tiny_minibatch() {
        assert!(MinibatchSampler::new(1).is_err());
    }

    #[test]
    fn dense_targets() -> Result<()> {
        let geometry = GridGeometryInit {
            input_size: [8, 24],
            output_size: [2, 6],
        }
        .build()?;
        let dense = DenseTargets::from_result(&result(3, 2), &geometry, 1)?;

        assert_eq!(dense.classification.shape(), &[2, 6, 1, 2]);
        assert_eq!(dense.regression.shape(), &[2, 6, 1, 4]);
        assert_eq!(dense.classification[[0, 2, 0, 0]], 1.0);
        assert_eq!(dense.classification[[0, 2, 0, 1]], 0.0);
        assert_eq!(dense.classification[[1, 1, 0, 1]], 1.0);
        assert_eq!(dense.classification[[1, 5, 0, 1]], 0.0);
        assert_eq!(dense.regression[[1, 1, 0, 0]], 1.0);
        assert_eq!(dense.classification.sum(), 5.0);
        Ok(())
    }

    #[test]
    fn dense_targets_reject_out_of_grid() -> Result<()> {
        let geometry = GridGeometryInit {
            input_size: [8, 8],
            output_size: [2, 2],
        }
        .build()?;
        assert!(DenseTargets::from_result(&result(3, 0), &geometry, 1).is_err());
        Ok(())
    }

    #[test]
    fn stats_ratio() {
        let results = vec![result(6, 2), result(0, 0)];
        let stats: AssignmentStats = results.iter().collect();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.positives, 2);
        assert_eq!(stats.negatives, 6);
        assert_eq!(stats.positive_ratio(), 0.25);
        assert_eq!(AssignmentStats::default().positive_ratio(), 0.0);

        let merged = stats.merge(&stats);
        assert_eq!(merged.frames, 4);
    }
}
