//! Frame classification.
//!
//! Maps a raw time-of-flight value onto the frame whose window contains it.
//! Windows are half-open (`lower <= t < upper`) and the first descriptor in
//! catalogue order wins, so the result is deterministic even for a
//! catalogue with overlapping windows.

use framestitch_core::FrameDescriptor;
use std::cmp::Ordering;

/// Frame a raw time-of-flight value was attributed to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Position of the frame in the catalogue.
    pub frame: usize,
    /// Shift to add to the raw time.
    pub shift: f64,
}

/// Classifies a single value by scanning `descriptors` in order.
///
/// Returns `None` for values outside every window, including NaN.
#[inline]
#[must_use]
pub fn classify(raw_time: f64, descriptors: &[FrameDescriptor]) -> Option<Classification> {
    descriptors
        .iter()
        .position(|d| d.contains(raw_time))
        .map(|frame| Classification {
            frame,
            shift: descriptors[frame].shift,
        })
}

/// Trait for frame classifiers.
pub trait FrameClassifier: Send + Sync {
    /// Returns the frame containing `raw_time`, if any.
    fn classify(&self, raw_time: f64) -> Option<Classification>;

    /// Returns the number of frames the classifier can assign.
    fn frame_count(&self) -> usize;

    /// Returns the name of the classifier.
    fn name(&self) -> &'static str;
}

/// Classifier selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClassifierKind {
    /// First-match scan over the descriptors.
    #[default]
    Linear,
    /// Binary search over precomputed elementary intervals.
    Interval,
}

/// First-match linear scan over borrowed descriptors.
#[derive(Debug, Clone, Copy)]
pub struct LinearClassifier<'a> {
    descriptors: &'a [FrameDescriptor],
}

impl<'a> LinearClassifier<'a> {
    /// Create a classifier over `descriptors`.
    #[must_use]
    pub fn new(descriptors: &'a [FrameDescriptor]) -> Self {
        Self { descriptors }
    }
}

impl FrameClassifier for LinearClassifier<'_> {
    #[inline]
    fn classify(&self, raw_time: f64) -> Option<Classification> {
        classify(raw_time, self.descriptors)
    }

    fn frame_count(&self) -> usize {
        self.descriptors.len()
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

/// Interval lookup over the sorted window boundaries.
///
/// Every window edge splits the time axis into elementary intervals. No edge
/// falls strictly inside an elementary interval, so each one is either fully
/// inside or fully outside every window, and its owner is the first window
/// containing its lower edge. Lookups then reduce to a binary search and
/// always agree with [`classify`], overlaps included.
#[derive(Debug, Clone, Default)]
pub struct IntervalClassifier {
    edges: Vec<f64>,
    owners: Vec<Option<Classification>>,
    frame_count: usize,
}

impl IntervalClassifier {
    /// Build the lookup table for `descriptors`.
    #[must_use]
    pub fn new(descriptors: &[FrameDescriptor]) -> Self {
        let mut edges: Vec<f64> = descriptors
            .iter()
            .filter(|d| !d.is_empty())
            .flat_map(|d| [d.lower_bound, d.upper_bound])
            .collect();
        edges.sort_by(f64::total_cmp);
        edges.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);

        let owners = edges
            .iter()
            .map(|&edge| classify(edge, descriptors))
            .collect();

        Self {
            edges,
            owners,
            frame_count: descriptors.len(),
        }
    }

    /// Number of elementary intervals in the table.
    #[must_use]
    pub fn interval_count(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }
}

impl FrameClassifier for IntervalClassifier {
    #[inline]
    fn classify(&self, raw_time: f64) -> Option<Classification> {
        if raw_time.is_nan() {
            return None;
        }
        let slot = self.edges.partition_point(|&edge| edge <= raw_time);
        if slot == 0 {
            return None;
        }
        self.owners[slot - 1]
    }

    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn name(&self) -> &'static str {
        "interval"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames() -> Vec<FrameDescriptor> {
        vec![
            FrameDescriptor::new(0.0, 50.0, 0.0),
            FrameDescriptor::new(50.0, 100.0, 1000.0),
        ]
    }

    #[test]
    fn test_classify_first_match() {
        let frames = frames();
        assert_eq!(
            classify(10.0, &frames),
            Some(Classification {
                frame: 0,
                shift: 0.0
            })
        );
        assert_eq!(
            classify(50.0, &frames),
            Some(Classification {
                frame: 1,
                shift: 1000.0
            })
        );
        assert_eq!(classify(100.0, &frames), None);
        assert_eq!(classify(-1.0, &frames), None);
        assert_eq!(classify(f64::NAN, &frames), None);
        assert_eq!(classify(10.0, &[]), None);
    }

    #[test]
    fn test_overlap_resolves_to_earlier_frame() {
        let frames = vec![
            FrameDescriptor::new(40.0, 60.0, 7.0),
            FrameDescriptor::new(0.0, 50.0, 3.0),
        ];
        assert_eq!(classify(45.0, &frames).map(|c| c.frame), Some(0));
        assert_eq!(classify(30.0, &frames).map(|c| c.frame), Some(1));
    }

    #[test]
    fn test_interval_matches_linear_on_overlaps() {
        let frames = vec![
            FrameDescriptor::new(10.0, 40.0, 1.0),
            FrameDescriptor::new(30.0, 70.0, 2.0),
            FrameDescriptor::new(0.0, 20.0, 3.0),
            FrameDescriptor::new(65.0, 65.0, 4.0),
            FrameDescriptor::new(80.0, f64::INFINITY, 5.0),
        ];
        let linear = LinearClassifier::new(&frames);
        let interval = IntervalClassifier::new(&frames);
        assert_eq!(interval.frame_count(), 5);

        let mut t = -5.0;
        while t < 120.0 {
            assert_eq!(interval.classify(t), linear.classify(t), "t = {t}");
            t += 0.25;
        }
        for t in [0.0, 10.0, 20.0, 30.0, 40.0, 65.0, 70.0, 80.0, f64::INFINITY] {
            assert_eq!(interval.classify(t), linear.classify(t), "t = {t}");
        }
        assert_eq!(interval.classify(f64::NAN), None);
        assert_eq!(interval.classify(f64::NEG_INFINITY), None);
    }

    #[test]
    fn test_interval_empty_catalogue() {
        let interval = IntervalClassifier::new(&[]);
        assert_eq!(interval.interval_count(), 0);
        assert_eq!(interval.classify(1.0), None);
    }

    #[test]
    fn test_interval_count_merges_shared_edges() {
        let interval = IntervalClassifier::new(&frames());
        // Edges 0, 50, 100.
        assert_eq!(interval.interval_count(), 2);
        assert_eq!(interval.name(), "interval");
    }
}
