//! Frame descriptors and the per-category frame catalogue.
//!
//! A WFM chopper cascade splits every source pulse into several frames,
//! each carrying its own wavelength band. A [`FrameDescriptor`] gives the
//! raw time-of-flight window that belongs to one frame and the shift that
//! moves it onto the common unwrapped axis. The [`FrameCatalogue`] groups
//! descriptors by [`SourceCategory`], since monitors and detector banks sit
//! at different distances and see different windows.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kind of event source an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SourceCategory {
    /// Beam monitor upstream of the sample.
    Monitor,
    /// Detector bank.
    Detector,
}

impl SourceCategory {
    /// Returns the lowercase name used in catalogue files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monitor => "monitor",
            Self::Detector => "detector",
        }
    }
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time window and unwrap shift of one WFM frame (all values in microseconds).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameDescriptor {
    /// Inclusive lower edge of the window.
    pub lower_bound: f64,
    /// Exclusive upper edge of the window.
    pub upper_bound: f64,
    /// Offset added to raw times classified into this frame.
    pub shift: f64,
}

impl FrameDescriptor {
    /// Creates a descriptor without checking the window.
    #[must_use]
    pub fn new(lower_bound: f64, upper_bound: f64, shift: f64) -> Self {
        Self {
            lower_bound,
            upper_bound,
            shift,
        }
    }

    /// Creates a descriptor, rejecting non-finite values and empty windows.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFrame`] if any value is not finite or if
    /// `lower_bound >= upper_bound`.
    pub fn try_new(lower_bound: f64, upper_bound: f64, shift: f64) -> Result<Self> {
        if !(lower_bound.is_finite() && upper_bound.is_finite() && shift.is_finite()) {
            return Err(Error::InvalidFrame(format!(
                "non-finite frame values: [{lower_bound}, {upper_bound}) shift {shift}"
            )));
        }
        if lower_bound >= upper_bound {
            return Err(Error::InvalidFrame(format!(
                "empty frame window: [{lower_bound}, {upper_bound})"
            )));
        }
        Ok(Self::new(lower_bound, upper_bound, shift))
    }

    /// Returns true if `time` lies in the half-open window `[lower, upper)`.
    #[inline]
    #[must_use]
    pub fn contains(&self, time: f64) -> bool {
        self.lower_bound <= time && time < self.upper_bound
    }

    /// Returns true if the window can never contain a value.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        // Also true for NaN bounds.
        !(self.lower_bound < self.upper_bound)
    }

    /// Returns true if both windows share at least one value.
    #[must_use]
    pub fn overlaps(&self, other: &FrameDescriptor) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.lower_bound < other.upper_bound
            && other.lower_bound < self.upper_bound
    }

    /// Returns the window with the shift applied, i.e. where this frame's
    /// events land on the unwrapped axis.
    #[must_use]
    pub fn unwrapped_window(&self) -> (f64, f64) {
        (self.lower_bound + self.shift, self.upper_bound + self.shift)
    }
}

/// Advisory issue found while validating a catalogue.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogueWarning {
    /// Two windows of the same category overlap; the earlier frame wins.
    Overlap {
        category: SourceCategory,
        first: usize,
        second: usize,
    },
    /// A window is empty or inverted and will never match.
    EmptyWindow {
        category: SourceCategory,
        frame: usize,
    },
    /// A bound or shift is NaN or infinite.
    NonFinite {
        category: SourceCategory,
        frame: usize,
    },
}

impl fmt::Display for CatalogueWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overlap {
                category,
                first,
                second,
            } => write!(
                f,
                "{category} frames {first} and {second} overlap; frame {first} takes precedence"
            ),
            Self::EmptyWindow { category, frame } => {
                write!(f, "{category} frame {frame} has an empty window")
            }
            Self::NonFinite { category, frame } => {
                write!(f, "{category} frame {frame} has non-finite values")
            }
        }
    }
}

/// Ordered frame descriptors for every configured source category.
///
/// The catalogue is immutable once built. Descriptor order within a
/// category decides which frame wins when windows overlap.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FrameCatalogue {
    frames: BTreeMap<SourceCategory, Vec<FrameDescriptor>>,
}

impl FrameCatalogue {
    /// Creates an empty catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the frames of one category, replacing any previous list.
    #[must_use]
    pub fn with_frames(mut self, category: SourceCategory, frames: Vec<FrameDescriptor>) -> Self {
        self.frames.insert(category, frames);
        self
    }

    /// Returns the ordered descriptors configured for `category`.
    ///
    /// # Errors
    /// Returns [`Error::UnknownCategory`] if the category is absent or has
    /// an empty frame list.
    pub fn descriptors_for(&self, category: SourceCategory) -> Result<&[FrameDescriptor]> {
        match self.frames.get(&category) {
            Some(frames) if !frames.is_empty() => Ok(frames),
            _ => Err(Error::UnknownCategory(category)),
        }
    }

    /// Returns the categories that have at least one frame.
    pub fn categories(&self) -> impl Iterator<Item = SourceCategory> + '_ {
        self.frames
            .iter()
            .filter(|(_, frames)| !frames.is_empty())
            .map(|(category, _)| *category)
    }

    /// Returns true if no category has any frame.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.values().all(Vec::is_empty)
    }

    /// Checks every category for overlapping, empty and non-finite windows.
    ///
    /// The stitching engine tolerates all of these, so they are reported
    /// rather than rejected.
    #[must_use]
    pub fn validate(&self) -> Vec<CatalogueWarning> {
        let mut warnings = Vec::new();
        for (&category, frames) in &self.frames {
            for (frame, descriptor) in frames.iter().enumerate() {
                let finite = descriptor.lower_bound.is_finite()
                    && descriptor.upper_bound.is_finite()
                    && descriptor.shift.is_finite();
                if !finite {
                    warnings.push(CatalogueWarning::NonFinite { category, frame });
                } else if descriptor.is_empty() {
                    warnings.push(CatalogueWarning::EmptyWindow { category, frame });
                }
            }
            for (first, a) in frames.iter().enumerate() {
                for (offset, b) in frames[first + 1..].iter().enumerate() {
                    if a.overlaps(b) {
                        warnings.push(CatalogueWarning::Overlap {
                            category,
                            first,
                            second: first + 1 + offset,
                        });
                    }
                }
            }
        }
        warnings
    }
}

impl FromIterator<(SourceCategory, Vec<FrameDescriptor>)> for FrameCatalogue {
    fn from_iter<I: IntoIterator<Item = (SourceCategory, Vec<FrameDescriptor>)>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_frames() -> Vec<FrameDescriptor> {
        vec![
            FrameDescriptor::new(0.0, 50.0, 0.0),
            FrameDescriptor::new(50.0, 100.0, 1000.0),
        ]
    }

    #[test]
    fn test_descriptor_window_is_half_open() {
        let frame = FrameDescriptor::new(10.0, 20.0, 5.0);
        assert!(frame.contains(10.0));
        assert!(frame.contains(19.999));
        assert!(!frame.contains(20.0));
        assert!(!frame.contains(9.999));
        assert!(!frame.contains(f64::NAN));
        assert_eq!(frame.unwrapped_window(), (15.0, 25.0));
    }

    #[test]
    fn test_descriptor_try_new_rejects_bad_windows() {
        assert!(FrameDescriptor::try_new(0.0, 10.0, -3.0).is_ok());
        assert!(matches!(
            FrameDescriptor::try_new(10.0, 10.0, 0.0),
            Err(Error::InvalidFrame(_))
        ));
        assert!(matches!(
            FrameDescriptor::try_new(0.0, f64::INFINITY, 0.0),
            Err(Error::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_adjacent_windows_do_not_overlap() {
        let frames = two_frames();
        assert!(!frames[0].overlaps(&frames[1]));
        assert!(frames[0].overlaps(&FrameDescriptor::new(49.0, 60.0, 0.0)));
    }

    #[test]
    fn test_descriptors_for_unknown_category() {
        let catalogue = FrameCatalogue::new().with_frames(SourceCategory::Detector, two_frames());
        assert_eq!(catalogue.descriptors_for(SourceCategory::Detector).unwrap().len(), 2);
        assert_eq!(
            catalogue.descriptors_for(SourceCategory::Monitor),
            Err(Error::UnknownCategory(SourceCategory::Monitor))
        );
    }

    #[test]
    fn test_empty_frame_list_is_unknown() {
        let catalogue = FrameCatalogue::new().with_frames(SourceCategory::Monitor, Vec::new());
        assert!(catalogue.is_empty());
        assert!(catalogue.descriptors_for(SourceCategory::Monitor).is_err());
        assert_eq!(catalogue.categories().count(), 0);
    }

    #[test]
    fn test_validate_reports_overlap_and_empty() {
        let catalogue = FrameCatalogue::from_iter([(
            SourceCategory::Detector,
            vec![
                FrameDescriptor::new(0.0, 50.0, 0.0),
                FrameDescriptor::new(40.0, 90.0, 10.0),
                FrameDescriptor::new(95.0, 95.0, 0.0),
                FrameDescriptor::new(f64::NAN, 120.0, 0.0),
            ],
        )]);

        let warnings = catalogue.validate();
        assert_eq!(
            warnings,
            vec![
                CatalogueWarning::EmptyWindow {
                    category: SourceCategory::Detector,
                    frame: 2
                },
                CatalogueWarning::NonFinite {
                    category: SourceCategory::Detector,
                    frame: 3
                },
                CatalogueWarning::Overlap {
                    category: SourceCategory::Detector,
                    first: 0,
                    second: 1
                },
            ]
        );
        assert_eq!(
            warnings[2].to_string(),
            "detector frames 0 and 1 overlap; frame 0 takes precedence"
        );
    }

    #[test]
    fn test_validate_clean_catalogue() {
        let catalogue = FrameCatalogue::new()
            .with_frames(SourceCategory::Detector, two_frames())
            .with_frames(SourceCategory::Monitor, two_frames());
        assert!(catalogue.validate().is_empty());
        assert_eq!(
            catalogue.categories().collect::<Vec<_>>(),
            vec![SourceCategory::Monitor, SourceCategory::Detector]
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_catalogue_json_shape() {
        let json = r#"{
            "monitor": [{"lower_bound": 0.0, "upper_bound": 10.0, "shift": 1.5}],
            "detector": [{"lower_bound": 5.0, "upper_bound": 15.0, "shift": -2.0}]
        }"#;
        let catalogue: FrameCatalogue = serde_json::from_str(json).unwrap();
        let monitor = catalogue.descriptors_for(SourceCategory::Monitor).unwrap();
        approx::assert_relative_eq!(monitor[0].shift, 1.5);
        let detector = catalogue.descriptors_for(SourceCategory::Detector).unwrap();
        approx::assert_relative_eq!(detector[0].shift, -2.0);
    }
}
