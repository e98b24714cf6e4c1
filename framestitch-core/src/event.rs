//! Event batch types.
//!
//! An [`EventBatch`] stores the events of one `NXevent_data` entry in
//! parallel vectors (`SoA` layout) together with the cumulative pulse index
//! that delimits which events belong to which source pulse. Batches are
//! validated on construction and never mutated afterwards; stitching
//! produces a new [`StitchedEventBatch`].

use crate::error::MalformedBatch;
use std::ops::{Deref, Range};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Events of one entry with a fence-post pulse index.
///
/// `pulse_index` has one entry per pulse plus a trailing total, so pulse
/// `k` owns events `pulse_index[k]..pulse_index[k + 1]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct EventBatch {
    times: Vec<f64>,
    ids: Vec<u32>,
    pulse_index: Vec<u64>,
}

impl Default for EventBatch {
    fn default() -> Self {
        Self {
            times: Vec::new(),
            ids: Vec::new(),
            pulse_index: vec![0],
        }
    }
}

impl EventBatch {
    /// Creates a batch from raw time-of-flight values (microseconds), pixel
    /// ids and a fence-post pulse index.
    ///
    /// An empty index is accepted for a batch without events and is
    /// normalised to `[0]` (zero pulses).
    ///
    /// # Errors
    /// Returns [`MalformedBatch`] if the arrays violate the batch invariants.
    pub fn new(
        times: Vec<f64>,
        ids: Vec<u32>,
        pulse_index: Vec<u64>,
    ) -> Result<Self, MalformedBatch> {
        let pulse_index = if pulse_index.is_empty() && times.is_empty() && ids.is_empty() {
            vec![0]
        } else {
            pulse_index
        };
        validate(&times, &ids, &pulse_index)?;
        Ok(Self {
            times,
            ids,
            pulse_index,
        })
    }

    /// Creates a batch from a NeXus-style `event_index`, which holds the
    /// first event of every pulse but no trailing total.
    ///
    /// # Errors
    /// Returns [`MalformedBatch`] if the arrays violate the batch invariants.
    pub fn from_pulse_starts(
        times: Vec<f64>,
        ids: Vec<u32>,
        mut pulse_starts: Vec<u64>,
    ) -> Result<Self, MalformedBatch> {
        if pulse_starts.is_empty() && !times.is_empty() {
            return Err(MalformedBatch::MissingIndex {
                events: times.len(),
            });
        }
        pulse_starts.push(times.len() as u64);
        Self::new(times, ids, pulse_starts)
    }

    /// Creates a batch without validating it.
    ///
    /// Callers must uphold the invariants checked by [`EventBatch::new`].
    /// A batch that breaks them never panics in [`Self::pulse_count`] or
    /// [`Self::pulse_starts`] (an empty index counts as zero pulses), but
    /// [`Self::pulse_range`] and [`Self::pulses`] may panic on an index that
    /// points past the event arrays. Run [`validate`] first when the arrays
    /// come from outside.
    #[must_use]
    pub fn new_unchecked(times: Vec<f64>, ids: Vec<u32>, pulse_index: Vec<u64>) -> Self {
        Self {
            times,
            ids,
            pulse_index,
        }
    }

    /// Time-of-flight values in microseconds.
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Pixel identifiers.
    #[must_use]
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// Fence-post pulse index (`pulse_count() + 1` entries).
    #[must_use]
    pub fn pulse_index(&self) -> &[u64] {
        &self.pulse_index
    }

    /// Pulse index in NeXus form: the first event of every pulse.
    #[must_use]
    pub fn pulse_starts(&self) -> &[u64] {
        self.pulse_index
            .split_last()
            .map_or(&[][..], |(_, starts)| starts)
    }

    /// Returns the number of events in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Returns true if the batch holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Returns the number of pulses.
    #[must_use]
    pub fn pulse_count(&self) -> usize {
        self.pulse_index.len().saturating_sub(1)
    }

    /// Event range covered by pulse `pulse`.
    ///
    /// # Panics
    /// Panics if `pulse >= self.pulse_count()`.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn pulse_range(&self, pulse: usize) -> Range<usize> {
        self.pulse_index[pulse] as usize..self.pulse_index[pulse + 1] as usize
    }

    /// Iterates over the events of each pulse as `(times, ids)` slices.
    pub fn pulses(&self) -> impl ExactSizeIterator<Item = (&[f64], &[u32])> + '_ {
        (0..self.pulse_count()).map(move |pulse| {
            let range = self.pulse_range(pulse);
            (&self.times[range.clone()], &self.ids[range])
        })
    }

    /// Smallest and largest time-of-flight, ignoring NaN values.
    #[must_use]
    pub fn time_range(&self) -> Option<(f64, f64)> {
        self.times
            .iter()
            .copied()
            .filter(|t| !t.is_nan())
            .fold(None, |range, t| match range {
                None => Some((t, t)),
                Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
            })
    }

    /// Consumes the batch and returns `(times, ids, pulse_index)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<f64>, Vec<u32>, Vec<u64>) {
        (self.times, self.ids, self.pulse_index)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for EventBatch {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            times: Vec<f64>,
            ids: Vec<u32>,
            pulse_index: Vec<u64>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.times, raw.ids, raw.pulse_index).map_err(serde::de::Error::custom)
    }
}

/// Checks the structural invariants of a fence-post event batch.
///
/// # Errors
/// Returns the first violated invariant.
pub fn validate(times: &[f64], ids: &[u32], pulse_index: &[u64]) -> Result<(), MalformedBatch> {
    if times.len() != ids.len() {
        return Err(MalformedBatch::LengthMismatch {
            times: times.len(),
            ids: ids.len(),
        });
    }
    let Some((&first, rest)) = pulse_index.split_first() else {
        return Err(MalformedBatch::MissingIndex {
            events: times.len(),
        });
    };
    if first != 0 {
        return Err(MalformedBatch::IndexStart { first });
    }
    let mut previous = first;
    for (pulse, &current) in rest.iter().enumerate() {
        if current < previous {
            return Err(MalformedBatch::IndexDecreasing {
                pulse: pulse + 1,
                previous,
                current,
            });
        }
        previous = current;
    }
    if previous != times.len() as u64 {
        return Err(MalformedBatch::IndexTotal {
            expected: times.len(),
            actual: previous,
        });
    }
    Ok(())
}

/// Event batch whose times sit on the unwrapped axis.
///
/// Dereferences to [`EventBatch`], so it can be inspected, stored or fed
/// into another stitching pass like any other batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StitchedEventBatch(EventBatch);

impl StitchedEventBatch {
    /// Wraps a batch whose times are already unwrapped.
    #[must_use]
    pub fn new(batch: EventBatch) -> Self {
        Self(batch)
    }

    /// Returns the inner batch.
    #[must_use]
    pub fn into_batch(self) -> EventBatch {
        self.0
    }
}

impl Deref for StitchedEventBatch {
    type Target = EventBatch;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
