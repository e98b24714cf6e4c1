//! Event stitching.
//!
//! Classifies every event of a batch into its WFM frame, moves its
//! time-of-flight onto the unwrapped axis and drops events that fall
//! outside every frame. Events keep their relative order and never leave
//! the pulse they were recorded in.

use crate::classifier::{ClassifierKind, FrameClassifier, IntervalClassifier, LinearClassifier};
use crate::index::rebuild_index;
use framestitch_core::{EventBatch, FrameDescriptor, StitchedEventBatch};
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Counters collected while stitching one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StitchStatistics {
    /// Number of pulses in the batch.
    pub pulses: usize,
    /// Number of events before stitching.
    pub input_events: usize,
    /// Number of events kept.
    pub output_events: usize,
    /// Number of events outside every frame window.
    pub dropped_events: usize,
    /// Number of kept events per frame, in catalogue order.
    pub frame_counts: Vec<usize>,
}

impl StitchStatistics {
    /// Fraction of input events that were dropped.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn drop_fraction(&self) -> f64 {
        if self.input_events == 0 {
            0.0
        } else {
            self.dropped_events as f64 / self.input_events as f64
        }
    }
}

/// Result of stitching one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StitchOutcome {
    /// Stitched events.
    pub batch: StitchedEventBatch,
    /// Counters for the batch.
    pub statistics: StitchStatistics,
}

/// Stitch a batch using the first-match linear classifier.
#[must_use]
pub fn stitch(batch: &EventBatch, descriptors: &[FrameDescriptor]) -> StitchedEventBatch {
    stitch_with(batch, &LinearClassifier::new(descriptors)).batch
}

/// Stitch a batch with an explicit classifier, collecting statistics.
#[must_use]
pub fn stitch_with<C>(batch: &EventBatch, classifier: &C) -> StitchOutcome
where
    C: FrameClassifier + ?Sized,
{
    let mut times = Vec::with_capacity(batch.len());
    let mut ids = Vec::with_capacity(batch.len());
    let mut survivors = Vec::with_capacity(batch.pulse_count());
    let mut frame_counts = vec![0usize; classifier.frame_count()];

    for (pulse_times, pulse_ids) in batch.pulses() {
        let before = times.len();
        for (&raw_time, &id) in pulse_times.iter().zip(pulse_ids) {
            if let Some(hit) = classifier.classify(raw_time) {
                times.push(raw_time + hit.shift);
                ids.push(id);
                frame_counts[hit.frame] += 1;
            }
        }
        survivors.push(times.len() - before);
    }

    let pulse_index = rebuild_index(&survivors);
    let statistics = StitchStatistics {
        pulses: batch.pulse_count(),
        input_events: batch.len(),
        output_events: times.len(),
        dropped_events: batch.len() - times.len(),
        frame_counts,
    };

    StitchOutcome {
        batch: StitchedEventBatch::new(EventBatch::new_unchecked(times, ids, pulse_index)),
        statistics,
    }
}

fn stitch_kind(
    batch: &EventBatch,
    descriptors: &[FrameDescriptor],
    kind: ClassifierKind,
) -> StitchOutcome {
    match kind {
        ClassifierKind::Linear => stitch_with(batch, &LinearClassifier::new(descriptors)),
        ClassifierKind::Interval => stitch_with(batch, &IntervalClassifier::new(descriptors)),
    }
}

/// Stitch independent batches in parallel.
///
/// Each job pairs a batch with the descriptors of its source category.
/// Outcomes are returned in job order.
#[must_use]
pub fn stitch_many(
    jobs: &[(&EventBatch, &[FrameDescriptor])],
    kind: ClassifierKind,
) -> Vec<StitchOutcome> {
    jobs.par_iter()
        .map(|&(batch, descriptors)| stitch_kind(batch, descriptors, kind))
        .collect()
}
