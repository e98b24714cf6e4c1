//! framestitch-algorithms: Stitching of WFM event data.
//!
//! This crate provides:
//! - **Frame classification** - linear first-match scan or interval lookup
//! - **Stitching** - per-pulse classification, shifting and filtering
//! - **Index reconstruction** - fence-post pulse index from survivor counts
//!
#![warn(missing_docs)]

mod classifier;
mod index;
mod stitch;

pub use classifier::{
    classify, Classification, ClassifierKind, FrameClassifier, IntervalClassifier,
    LinearClassifier,
};
pub use index::rebuild_index;
pub use stitch::{stitch, stitch_many, stitch_with, StitchOutcome, StitchStatistics};

// Re-export core frame and event types
pub use framestitch_core::{EventBatch, FrameDescriptor, StitchedEventBatch};
