//! Per-frame target preparation over an annotation store.

use crate::{
    anchor::AnchorGrid,
    annotation::{AnnotationStore, FrameId},
    assign::{AssignmentRecord, AssignmentResult, TargetAssigner},
    common::*,
    config::Config,
    ground_truth::{FilterReport, FilteredTruth, GroundTruthFilter},
    minibatch::{AssignmentStats, DenseTargets, MinibatchSampler},
};

/// The outcome of preparing one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAssignment {
    pub frame: FrameId,
    pub truth: FilteredTruth,
    pub report: FilterReport,
    pub result: AssignmentResult,
}

impl FrameAssignment {
    pub fn to_record(&self) -> FrameRecord {
        FrameRecord {
            frame: self.frame,
            report: self.report,
            targets: self.result.to_record(),
        }
    }
}

/// The serialized form of [FrameAssignment].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: FrameId,
    pub report: FilterReport,
    pub targets: AssignmentRecord,
}

/// Everything needed to turn raw annotations into training targets, built
/// once from a [Config].
#[derive(Debug, Clone)]
pub struct TargetPreparer {
    filter: GroundTruthFilter,
    grid: AnchorGrid,
    assigner: TargetAssigner,
    sampler: MinibatchSampler,
}

impl TargetPreparer {
    pub fn new(config: &Config) -> Result<Self> {
        let Config {
            anchors,
            geometry,
            filter,
            thresholds,
            minibatch_size,
        } = config.clone();

        let anchors = anchors.build().context("invalid anchor config")?;
        let geometry = geometry.build().context("invalid grid geometry")?;
        let filter = filter.build().context("invalid filter config")?;
        let thresholds = thresholds.build().context("invalid thresholds")?;
        let sampler = MinibatchSampler::new(minibatch_size)?;

        let grid = AnchorGrid::new(anchors, geometry);
        let assigner = TargetAssigner::new(&grid, thresholds);
        info!(
            "{} anchors in total, {} inside the image",
            assigner.num_anchors(),
            assigner.num_inside_anchors()
        );

        Ok(Self {
            filter,
            grid,
            assigner,
            sampler,
        })
    }

    pub fn filter(&self) -> &GroundTruthFilter {
        &self.filter
    }

    pub fn grid(&self) -> &AnchorGrid {
        &self.grid
    }

    pub fn assigner(&self) -> &TargetAssigner {
        &self.assigner
    }

    pub fn sampler(&self) -> &MinibatchSampler {
        &self.sampler
    }

    pub fn prepare_frame<S>(&self, store: &S, frame: &FrameId) -> FrameAssignment
    where
        S: AnnotationStore + ?Sized,
    {
        prepare_frame(store, frame, &self.filter, &self.assigner)
    }

    pub fn prepare_frames<S>(&self, store: &S, frames: &[FrameId]) -> Vec<FrameAssignment>
    where
        S: AnnotationStore + Sync + ?Sized,
    {
        assign_frames(store, frames, &self.filter, &self.assigner)
    }

    /// Samples a training minibatch from the result and lays it out on the
    /// grid.
    pub fn minibatch<R>(&self, result: &AssignmentResult, rng: &mut R) -> Result<DenseTargets>
    where
        R: Rng + ?Sized,
    {
        let sampled = self.sampler.sample(result, rng);
        DenseTargets::from_result(
            &sampled,
            self.grid.geometry(),
            self.grid.config().num_shapes(),
        )
    }
}

/// Filters and assigns one frame.
pub fn prepare_frame<S>(
    store: &S,
    frame: &FrameId,
    filter: &GroundTruthFilter,
    assigner: &TargetAssigner,
) -> FrameAssignment
where
    S: AnnotationStore + ?Sized,
{
    let (truth, report) = filter.filter_frame(store, frame);
    let result = assigner.assign(&truth);
    FrameAssignment {
        frame: *frame,
        truth,
        report,
        result,
    }
}

/// Filters and assigns frames in parallel. The output follows the order of
/// `frames`.
pub fn assign_frames<S>(
    store: &S,
    frames: &[FrameId],
    filter: &GroundTruthFilter,
    assigner: &TargetAssigner,
) -> Vec<FrameAssignment>
where
    S: AnnotationStore + Sync + ?Sized,
{
    let outputs: Vec<_> = frames
        .par_iter()
        .map(|frame| prepare_frame(store, frame, filter, assigner))
        .collect();

    let stats: AssignmentStats = outputs.iter().map(|output| &output.result).collect();
    let report = outputs
        .iter()
        .fold(FilterReport::default(), |total, output| {
            total.merge(&output.report)
        });
    info!(
        "assigned {} frames: {} positive and {} negative anchors, {} boxes kept, {} malformed",
        stats.frames, stats.positives, stats.negatives, report.kept, report.malformed
    );

    outputs
}
