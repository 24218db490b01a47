use crate::{anchor::AnchorIndex, common::*, regression::BoxDelta};

/// The label of one anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorLabel {
    Positive,
    Negative,
    /// Crossing the image boundary or too ambiguous to train on.
    Excluded,
}

/// The training targets of one image.
///
/// An anchor is in at most one of `negatives` and `positives`. Every
/// positive anchor has a regression target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentResult {
    pub negatives: IndexSet<AnchorIndex>,
    /// Positive anchors and the index of the matched positive box.
    pub positives: IndexMap<AnchorIndex, usize>,
    pub regression: IndexMap<AnchorIndex, BoxDelta>,
}

impl AssignmentResult {
    pub fn num_negatives(&self) -> usize {
        self.negatives.len()
    }

    pub fn num_positives(&self) -> usize {
        self.positives.len()
    }

    pub fn label_of(&self, index: &AnchorIndex) -> AnchorLabel {
        if self.positives.contains_key(index) {
            AnchorLabel::Positive
        } else if self.negatives.contains(index) {
            AnchorLabel::Negative
        } else {
            AnchorLabel::Excluded
        }
    }

    /// The positive anchors matched to the given box.
    pub fn anchors_of(&self, truth_index: usize) -> impl Iterator<Item = &AnchorIndex> + '_ {
        self.positives
            .iter()
            .filter(move |(_, &matched)| matched == truth_index)
            .map(|(index, _)| index)
    }

    /// Flattens the result into index arrays for storage.
    pub fn to_record(&self) -> AssignmentRecord {
        let negatives = self.negatives.iter().map(|index| index.to_array()).collect();
        let (positives, matched, regression) = self
            .positives
            .iter()
            .map(|(index, &truth_index)| {
                let delta = self.regression[index];
                (index.to_array(), truth_index, delta.to_array())
            })
            .multiunzip();

        AssignmentRecord {
            negatives,
            positives,
            matched,
            regression,
        }
    }
}

/// The serialized form of [AssignmentResult], aligned arrays of
/// `[row, col, shape]` triples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub negatives: Vec<[usize; 3]>,
    pub positives: Vec<[usize; 3]>,
    /// Matched box index per positive anchor.
    pub matched: Vec<usize>,
    /// `[dy, dx, dh, dw]` per positive anchor.
    pub regression: Vec<[f64; 4]>,
}

impl AssignmentRecord {
    pub fn into_result(self) -> Result<AssignmentResult> {
        let Self {
            negatives,
            positives,
            matched,
            regression,
        } = self;

        ensure!(
            positives.len() == matched.len() && positives.len() == regression.len(),
            "positives, matched and regression must have the same length"
        );

        let negatives: IndexSet<_> = negatives
            .into_iter()
            .map(|[row, col, shape]| AnchorIndex { row, col, shape })
            .collect();
        let mut result = AssignmentResult {
            negatives,
            ..Default::default()
        };

        for ([row, col, shape], truth_index, [dy, dx, dh, dw]) in
            izip!(positives, matched, regression)
        {
            let index = AnchorIndex { row, col, shape };
            ensure!(
                !result.negatives.contains(&index),
                "anchor {} is both positive and negative",
                index
            );
            ensure!(
                result.positives.insert(index, truth_index).is_none(),
                "duplicated positive anchor {}",
                index
            );
            result.regression.insert(index, BoxDelta { dy, dx, dh, dw });
        }

        Ok(result)
    }
}
