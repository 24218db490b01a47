//! Selection of ground truth boxes from raw annotations.

use crate::{
    annotation::{AnnotationStore, FrameId, RawObject, VisibleRegion},
    common::*,
};

/// Whether a ground truth box is matched to anchors or only suppresses
/// negatives around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Kept,
    Undesirable,
}

/// A filtered ground truth box.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    pub rect: TLHW<f64>,
    pub category: Category,
    /// Position of the object in the raw annotation list.
    pub source_index: usize,
}

/// The boxes of one image after filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredTruth {
    pub positives: Vec<GroundTruth>,
    pub undesirables: Vec<GroundTruth>,
}

impl FilteredTruth {
    /// Wraps bare positive boxes, numbering them in order.
    pub fn from_positive_rects<I>(rects: I) -> Self
    where
        I: IntoIterator<Item = TLHW<f64>>,
    {
        let positives = rects
            .into_iter()
            .enumerate()
            .map(|(source_index, rect)| GroundTruth {
                rect,
                category: Category::Kept,
                source_index,
            })
            .collect();
        Self {
            positives,
            undesirables: vec![],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positives.is_empty() && self.undesirables.is_empty()
    }
}

/// Per-image counts of what the filter did with each object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterReport {
    pub kept: usize,
    pub undesirable: usize,
    /// Objects with a non-target label.
    pub ignored: usize,
    pub too_narrow: usize,
    pub unknown_visibility: usize,
    pub low_visibility: usize,
    pub malformed: usize,
}

impl FilterReport {
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            kept: self.kept + other.kept,
            undesirable: self.undesirable + other.undesirable,
            ignored: self.ignored + other.ignored,
            too_narrow: self.too_narrow + other.too_narrow,
            unknown_visibility: self.unknown_visibility + other.unknown_visibility,
            low_visibility: self.low_visibility + other.low_visibility,
            malformed: self.malformed + other.malformed,
        }
    }
}

/// The ground truth filter options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthFilterInit {
    /// Labels eligible as positives.
    #[serde(default = "default_target_labels")]
    pub target_labels: IndexSet<String>,
    /// Objects narrower than this, in pixels, are rejected.
    #[serde(default = "default_minimum_width")]
    pub minimum_width: R64,
    /// The minimum visible fraction of an occluded object's area.
    #[serde(default = "default_minimum_visible_ratio")]
    pub minimum_visible_ratio: R64,
    /// If set, rejected target objects suppress negatives around them.
    #[serde(default)]
    pub use_undesirables: bool,
    /// If set along with `use_undesirables`, non-target objects suppress
    /// negatives as well.
    #[serde(default)]
    pub non_target_undesirable: bool,
}

impl Default for GroundTruthFilterInit {
    fn default() -> Self {
        Self {
            target_labels: default_target_labels(),
            minimum_width: default_minimum_width(),
            minimum_visible_ratio: default_minimum_visible_ratio(),
            use_undesirables: false,
            non_target_undesirable: false,
        }
    }
}

impl GroundTruthFilterInit {
    pub fn build(self) -> Result<GroundTruthFilter> {
        let Self {
            target_labels,
            minimum_width,
            minimum_visible_ratio,
            use_undesirables,
            non_target_undesirable,
        } = self;

        ensure!(
            !target_labels.is_empty(),
            "at least one target label is required"
        );
        ensure!(minimum_width >= 0.0, "minimum_width must be non-negative");
        ensure!(
            (0.0..=1.0).contains(&minimum_visible_ratio.raw()),
            "minimum_visible_ratio must be in range [0, 1]"
        );
        if non_target_undesirable && !use_undesirables {
            warn!("non_target_undesirable has no effect unless use_undesirables is set");
        }

        Ok(GroundTruthFilter {
            target_labels,
            minimum_width: minimum_width.raw(),
            minimum_visible_ratio: minimum_visible_ratio.raw(),
            use_undesirables,
            non_target_undesirable: use_undesirables && non_target_undesirable,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    TooNarrow,
    UnknownVisibility,
    LowVisibility,
}

#[derive(Debug, Clone, PartialEq)]
enum Verdict {
    Keep(TLHW<f64>),
    Reject(Rejection, TLHW<f64>),
    NonTarget(TLHW<f64>),
    Malformed,
}

/// Splits raw objects into positive and undesirable boxes.
#[derive(Debug, Clone)]
pub struct GroundTruthFilter {
    target_labels: IndexSet<String>,
    minimum_width: f64,
    minimum_visible_ratio: f64,
    use_undesirables: bool,
    non_target_undesirable: bool,
}

impl GroundTruthFilter {
    /// Filters the objects of a frame served by the store.
    pub fn filter_frame<S>(&self, store: &S, frame: &FrameId) -> (FilteredTruth, FilterReport)
    where
        S: AnnotationStore + ?Sized,
    {
        let (truth, report) = self.filter(store.objects(frame));
        if report.malformed > 0 {
            warn!(
                "dropped {} malformed objects in frame {}",
                report.malformed, frame
            );
        }
        (truth, report)
    }

    pub fn filter(&self, objects: &[RawObject]) -> (FilteredTruth, FilterReport) {
        let mut truth = FilteredTruth::default();
        let mut report = FilterReport::default();

        objects
            .iter()
            .enumerate()
            .for_each(|(source_index, object)| {
                let rect = match self.judge(object) {
                    Verdict::Keep(rect) => {
                        report.kept += 1;
                        truth.positives.push(GroundTruth {
                            rect,
                            category: Category::Kept,
                            source_index,
                        });
                        return;
                    }
                    Verdict::Reject(reason, rect) => {
                        match reason {
                            Rejection::TooNarrow => report.too_narrow += 1,
                            Rejection::UnknownVisibility => report.unknown_visibility += 1,
                            Rejection::LowVisibility => report.low_visibility += 1,
                        }
                        if !self.use_undesirables {
                            return;
                        }
                        rect
                    }
                    Verdict::NonTarget(rect) => {
                        report.ignored += 1;
                        if !self.non_target_undesirable {
                            return;
                        }
                        rect
                    }
                    Verdict::Malformed => {
                        debug!("malformed object {:?}", object);
                        report.malformed += 1;
                        return;
                    }
                };

                report.undesirable += 1;
                truth.undesirables.push(GroundTruth {
                    rect,
                    category: Category::Undesirable,
                    source_index,
                });
            });

        (truth, report)
    }

    fn judge(&self, object: &RawObject) -> Verdict {
        let full = match object.full_box().map(TLHW::try_from_xywh) {
            Some(Ok(rect)) if rect.has_positive_area() => rect,
            _ => return Verdict::Malformed,
        };

        if !self.target_labels.contains(&object.label) {
            return Verdict::NonTarget(full);
        }

        let mut rejection = None;
        let mut rect = full;

        if full.w() < self.minimum_width {
            rejection = Some(Rejection::TooNarrow);
        }

        if object.occluded {
            match &object.visible {
                Some(VisibleRegion::Box(xywh)) => {
                    let visible = match TLHW::try_from_xywh(*xywh) {
                        Ok(visible) if visible.has_positive_area() => visible,
                        _ => return Verdict::Malformed,
                    };
                    if visible.area() < self.minimum_visible_ratio * full.area()
                        && rejection.is_none()
                    {
                        rejection = Some(Rejection::LowVisibility);
                        rect = visible;
                    }
                }
                Some(VisibleRegion::Sentinel(_)) => {
                    rejection = rejection.or(Some(Rejection::UnknownVisibility));
                }
                Some(VisibleRegion::Invalid(_)) | None => return Verdict::Malformed,
            }
        }

        match rejection {
            None => Verdict::Keep(rect),
            Some(reason) => Verdict::Reject(reason, rect),
        }
    }
}

fn default_target_labels() -> IndexSet<String> {
    IndexSet::from_iter(["person".to_string()])
}

fn default_minimum_width() -> R64 {
    r64(10.0)
}

fn default_minimum_visible_ratio() -> R64 {
    r64(0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(label: &str, pos: [f64; 4], visible: Option<VisibleRegion>) -> RawObject {
        RawObject {
            label: label.to_string(),
            pos: pos.to_vec(),
            occluded: visible.is_some(),
            visible,
        }
    }

    fn undesirable_filter() -> GroundTruthFilter {
        GroundTruthFilterInit {
            use_undesirables: true,
            non_target_undesirable: true,
            ..Default::default()
        }
        .build()
        .unwrap()
    }

    #[test]
    fn keep_visible_person() {
        let filter = GroundTruthFilterInit::default().build().unwrap();
        let objects = vec![object("person", [10.0, 20.0, 30.0, 60.0], None)];

        let (truth, report) = filter.filter(&objects);
        assert_eq!(truth.positives.len(), 1);
        assert_eq!(truth.positives[0].rect.tlhw(), [20.0, 10.0, 60.0, 30.0]);
        assert_eq!(truth.positives[0].category, Category::Kept);
        assert!(truth.undesirables.is_empty());
        assert_eq!(report.kept, 1);
    }

    #[test]
    fn ignore_other_labels_by_default() {
        let filter = GroundTruthFilterInit::default().build().unwrap();
        let objects = vec![
            object("people", [10.0, 20.0, 30.0, 60.0], None),
            object("person?", [50.0, 20.0, 30.0, 60.0], None),
        ];

        let (truth, report) = filter.filter(&objects);
        assert!(truth.is_empty());
        assert_eq!(report.ignored, 2);
    }

    #[test]
    fn reject_narrow_person() {
        let filter = GroundTruthFilterInit::default().build().unwrap();
        let objects = vec![object("person", [10.0, 20.0, 9.0, 60.0], None)];
        let (truth, report) = filter.filter(&objects);
        assert!(truth.is_empty());
        assert_eq!(report.too_narrow, 1);

        let (truth, _) = undesirable_filter().filter(&objects);
        assert!(truth.positives.is_empty());
        assert_eq!(truth.undesirables.len(), 1);
        assert_eq!(truth.undesirables[0].rect.tlhw(), [20.0, 10.0, 60.0, 9.0]);
    }

    #[test]
    fn occlusion_rules() {
        let filter = GroundTruthFilterInit::default().build().unwrap();
        let objects = vec![
            // half visible is enough
            object(
                "person",
                [10.0, 20.0, 30.0, 60.0],
                Some(VisibleRegion::Box([10.0, 20.0, 30.0, 30.0])),
            ),
            // too little visible
            object(
                "person",
                [100.0, 20.0, 30.0, 60.0],
                Some(VisibleRegion::Box([100.0, 20.0, 30.0, 20.0])),
            ),
            // unknown visible region
            object("person", [200.0, 20.0, 30.0, 60.0], Some(VisibleRegion::Sentinel(1))),
        ];

        let (truth, report) = filter.filter(&objects);
        assert_eq!(truth.positives.len(), 1);
        assert_eq!(truth.positives[0].source_index, 0);
        assert_eq!(truth.positives[0].rect.tlhw(), [20.0, 10.0, 60.0, 30.0]);
        assert_eq!(report.low_visibility, 1);
        assert_eq!(report.unknown_visibility, 1);

        let (truth, _) = undesirable_filter().filter(&objects);
        let undesirables: Vec<_> = truth
            .undesirables
            .iter()
            .map(|gt| (gt.source_index, gt.rect.tlhw()))
            .collect();
        assert_eq!(
            undesirables,
            vec![
                (1, [20.0, 100.0, 20.0, 30.0]),
                (2, [20.0, 200.0, 60.0, 30.0]),
            ]
        );
    }

    #[test]
    fn non_target_undesirables() {
        let objects = vec![object("people", [10.0, 20.0, 30.0, 60.0], None)];
        let (truth, _) = undesirable_filter().filter(&objects);
        assert_eq!(truth.undesirables.len(), 1);
        assert_eq!(truth.undesirables[0].category, Category::Undesirable);

        let filter = GroundTruthFilterInit {
            use_undesirables: true,
            ..Default::default()
        }
        .build()
        .unwrap();
        let (truth, _) = filter.filter(&objects);
        assert!(truth.is_empty());
    }

    #[test]
    fn drop_malformed_objects() {
        let filter = undesirable_filter();
        let objects = vec![
            object("person", [10.0, 20.0, 30.0, 0.0], None),
            object("person", [10.0, 20.0, -30.0, 60.0], None),
            object(
                "person",
                [10.0, 20.0, 30.0, 60.0],
                Some(VisibleRegion::Box([10.0, 20.0, 0.0, 60.0])),
            ),
            object("person", [50.0, 20.0, 30.0, 60.0], None),
        ];

        let (truth, report) = filter.filter(&objects);
        assert_eq!(report.malformed, 3);
        assert!(truth.undesirables.is_empty());
        assert_eq!(truth.positives.len(), 1);
        assert_eq!(truth.positives[0].source_index, 3);
    }

    #[test]
    fn drop_objects_with_invalid_fields() {
        let filter = undesirable_filter();
        let mut short_box = object("person", [0.0; 4], None);
        short_box.pos = vec![10.0, 20.0, 30.0];
        let objects = vec![
            object(
                "person",
                [100.0, 20.0, 30.0, 60.0],
                Some(VisibleRegion::Invalid(serde_json::json!([100, 20, 30]))),
            ),
            short_box,
            object("person", [50.0, 20.0, 30.0, 60.0], None),
        ];

        let (truth, report) = filter.filter(&objects);
        assert_eq!(report.malformed, 2);
        assert!(truth.undesirables.is_empty());
        assert_eq!(truth.positives.len(), 1);
        assert_eq!(truth.positives[0].source_index, 2);
    }

    #[test]
    fn invalid_filter_config() {
        let init = GroundTruthFilterInit {
            minimum_visible_ratio: r64(1.5),
            ..Default::default()
        };
        assert!(init.build().is_err());

        let init = GroundTruthFilterInit {
            target_labels: IndexSet::new(),
            ..Default::default()
        };
        assert!(init.build().is_err());
    }
}
