//! Training target assignment for anchor-based pedestrian detectors.
//!
//! Given an image's raw annotations, the crate filters the ground truth,
//! lays a dense grid of anchors over the image and labels every anchor as
//! positive, negative or excluded, together with box regression targets
//! for the positives.

mod common;

pub mod anchor;
pub mod annotation;
pub mod assign;
pub mod config;
pub mod ground_truth;
pub mod minibatch;
pub mod prepare;
pub mod regression;

pub use anchor::{is_cross_boundary, AnchorConfig, AnchorGrid, AnchorIndex, GridGeometry};
pub use annotation::{AnnotationStore, CaltechAnnotations, FrameId, RawObject};
pub use assign::{assign, AnchorLabel, AssignmentResult, TargetAssigner, Thresholds};
pub use config::Config;
pub use ground_truth::{FilterReport, FilteredTruth, GroundTruth, GroundTruthFilter};
pub use minibatch::{AssignmentStats, DenseTargets, MinibatchSampler};
pub use prepare::{assign_frames, FrameAssignment, TargetPreparer};
pub use regression::BoxDelta;
