use super::{AssignmentResult, OverlapMatrix, Thresholds};
use crate::{
    anchor::{is_cross_boundary, AnchorConfig, AnchorGrid, AnchorIndex, GridGeometry},
    common::*,
    ground_truth::FilteredTruth,
    regression::BoxDelta,
};

/// Labels the anchors of a grid against the ground truth of an image.
///
/// Anchor boxes and their boundary flags do not depend on the ground truth,
/// so they are computed once and reused for every image.
#[derive(Debug, Clone)]
pub struct TargetAssigner {
    thresholds: Thresholds,
    indices: Vec<AnchorIndex>,
    boxes: Vec<TLHW<f64>>,
    cross_boundary: Vec<bool>,
}

impl TargetAssigner {
    /// Creates an assigner for images of the grid's input size.
    pub fn new(grid: &AnchorGrid, thresholds: Thresholds) -> Self {
        let image_size = *grid.geometry().input_size();
        Self::with_image_size(grid, image_size, thresholds)
    }

    pub fn with_image_size(grid: &AnchorGrid, image_size: HW<usize>, thresholds: Thresholds) -> Self {
        let (indices, boxes): (Vec<_>, Vec<_>) = grid.boxes().into_iter().unzip();
        let cross_boundary: Vec<_> = boxes
            .iter()
            .map(|rect| is_cross_boundary(rect, &image_size))
            .collect();

        let num_crossing = cross_boundary.iter().filter(|&&crossing| crossing).count();
        debug!(
            "{} out of {} anchors cross the {}x{} image boundary",
            num_crossing,
            boxes.len(),
            image_size.h(),
            image_size.w()
        );

        Self {
            thresholds,
            indices,
            boxes,
            cross_boundary,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn num_anchors(&self) -> usize {
        self.boxes.len()
    }

    /// Number of anchors that take part in training at all.
    pub fn num_inside_anchors(&self) -> usize {
        self.cross_boundary.iter().filter(|&&crossing| !crossing).count()
    }

    pub fn assign(&self, truth: &FilteredTruth) -> AssignmentResult {
        let Thresholds {
            negative: negative_threshold,
            positive: positive_threshold,
            negative_overlap,
        } = self.thresholds;

        // boxes without area cannot be regressed to
        let (positive_indices, positive_rects): (Vec<_>, Vec<_>) = truth
            .positives
            .iter()
            .enumerate()
            .filter_map(|(truth_index, gt)| {
                if gt.rect.has_positive_area() {
                    Some((truth_index, gt.rect))
                } else {
                    warn!("ignore degenerate ground truth box {:?}", gt.rect);
                    None
                }
            })
            .unzip();
        let suppressing_rects: Vec<_> = positive_rects
            .iter()
            .cloned()
            .chain(truth.undesirables.iter().map(|gt| gt.rect))
            .collect();

        // anchors far from every box are negative
        let negative_mask: Vec<bool> = if suppressing_rects.is_empty() {
            vec![true; self.boxes.len()]
        } else {
            let matrix = OverlapMatrix::compute(&self.boxes, &suppressing_rects, |anchor, rect| {
                negative_overlap.measure(anchor, rect)
            });
            (0..self.boxes.len())
                .map(|anchor| {
                    matrix
                        .max_overlap(anchor)
                        .map(|overlap| overlap <= negative_threshold)
                        .unwrap_or(true)
                })
                .collect()
        };

        // anchors close to a box are positive, and every box claims at
        // least its best anchor
        let matches: Vec<Option<usize>> = if positive_rects.is_empty() {
            vec![None; self.boxes.len()]
        } else {
            let mut matrix = OverlapMatrix::compute(&self.boxes, &positive_rects, |anchor, rect| {
                anchor.iou_with(rect)
            });
            (0..positive_rects.len()).for_each(|column| {
                if let Some(anchor) = matrix.best_anchor(column) {
                    matrix.force(anchor, column, 1.0);
                }
            });

            (0..self.boxes.len())
                .map(|anchor| {
                    let (column, overlap) = matrix.best_truth(anchor)?;
                    (overlap >= positive_threshold).then(|| column)
                })
                .collect()
        };

        // positives win over negatives, boundary crossing anchors are dropped
        let mut result = AssignmentResult::default();
        izip!(
            &self.indices,
            &self.boxes,
            &self.cross_boundary,
            &negative_mask,
            &matches
        )
        .filter(|(_, _, crossing, _, _)| !**crossing)
        .for_each(|(&index, anchor, _, &negative, &matched)| match matched {
            Some(column) => {
                let delta = BoxDelta::encode(anchor, &positive_rects[column]);
                result.positives.insert(index, positive_indices[column]);
                result.regression.insert(index, delta);
            }
            None if negative => {
                result.negatives.insert(index);
            }
            None => {}
        });

        debug!(
            "assigned {} positive and {} negative anchors for {} boxes",
            result.num_positives(),
            result.num_negatives(),
            positive_rects.len()
        );

        result
    }
}

/// Labels the anchors of one image.
///
/// It builds the anchor grid on every call. Use [TargetAssigner] to reuse it
/// across images.
pub fn assign(
    image_size: &HW<usize>,
    anchor_config: &AnchorConfig,
    grid_geometry: &GridGeometry,
    ground_truth: &FilteredTruth,
    thresholds: &Thresholds,
) -> AssignmentResult {
    let grid = AnchorGrid::new(anchor_config.clone(), grid_geometry.clone());
    TargetAssigner::with_image_size(&grid, *image_size, *thresholds).assign(ground_truth)
}
