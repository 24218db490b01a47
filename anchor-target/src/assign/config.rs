use crate::common::*;

/// The overlap measure deciding negative anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NegativeOverlap {
    /// Plain intersection over union.
    IoU,
    /// The larger of IoU and the fraction of the anchor covered by the box.
    IoUOrAnchorContainment,
}

impl Default for NegativeOverlap {
    fn default() -> Self {
        Self::IoU
    }
}

impl NegativeOverlap {
    pub fn measure(&self, anchor: &TLHW<f64>, truth: &TLHW<f64>) -> f64 {
        match self {
            Self::IoU => anchor.iou_with(truth),
            Self::IoUOrAnchorContainment => anchor.containment_iou_with(truth),
        }
    }
}

/// The labeling threshold options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsInit {
    /// Anchors overlapping every box by at most this are negative.
    #[serde(default = "default_negative_threshold")]
    pub negative_threshold: R64,
    /// Anchors overlapping some positive box by at least this are positive.
    #[serde(default = "default_positive_threshold")]
    pub positive_threshold: R64,
    #[serde(default)]
    pub negative_overlap: NegativeOverlap,
}

impl Default for ThresholdsInit {
    fn default() -> Self {
        Self {
            negative_threshold: default_negative_threshold(),
            positive_threshold: default_positive_threshold(),
            negative_overlap: NegativeOverlap::default(),
        }
    }
}

impl ThresholdsInit {
    pub fn build(self) -> Result<Thresholds> {
        let Self {
            negative_threshold,
            positive_threshold,
            negative_overlap,
        } = self;

        ensure!(
            (0.0..=1.0).contains(&negative_threshold.raw()),
            "negative_threshold must be in range [0, 1]"
        );
        ensure!(
            (0.0..=1.0).contains(&positive_threshold.raw()),
            "positive_threshold must be in range [0, 1]"
        );
        if negative_threshold >= positive_threshold {
            warn!(
                "negative_threshold {} is not below positive_threshold {}",
                negative_threshold, positive_threshold
            );
        }

        Ok(Thresholds {
            negative: negative_threshold.raw(),
            positive: positive_threshold.raw(),
            negative_overlap,
        })
    }
}

/// The validated labeling thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub(crate) negative: f64,
    pub(crate) positive: f64,
    pub(crate) negative_overlap: NegativeOverlap,
}

impl Thresholds {
    pub fn negative(&self) -> f64 {
        self.negative
    }

    pub fn positive(&self) -> f64 {
        self.positive
    }

    pub fn negative_overlap(&self) -> NegativeOverlap {
        self.negative_overlap
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            negative: 0.3,
            positive: 0.7,
            negative_overlap: NegativeOverlap::IoU,
        }
    }
}

fn default_negative_threshold() -> R64 {
    r64(0.3)
}

fn default_positive_threshold() -> R64 {
    r64(0.7)
}
