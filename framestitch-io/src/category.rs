//! Source category resolution from entry names.

use framestitch_core::SourceCategory;

const MONITOR_MARKER: &str = "monitor";

/// Decide which frame set applies to an entry.
///
/// Entries whose path contains `monitor` are monitors; every other event
/// entry is treated as a detector bank. The match is case-sensitive, so
/// `Monitor_2` resolves to the detector frame set.
#[must_use]
pub fn resolve_category(entry: &str) -> SourceCategory {
    if entry.contains(MONITOR_MARKER) {
        SourceCategory::Monitor
    } else {
        SourceCategory::Detector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_category() {
        assert_eq!(
            resolve_category("/entry/monitor_1/events"),
            SourceCategory::Monitor
        );
        assert_eq!(
            resolve_category("entry/Monitor_2/events/"),
            SourceCategory::Detector
        );
        assert_eq!(
            resolve_category("/entry/instrument/detector_1/events"),
            SourceCategory::Detector
        );
        assert_eq!(resolve_category("/entry/DENEX"), SourceCategory::Detector);
        assert_eq!(resolve_category("entry/MONITOR"), SourceCategory::Detector);
        assert_eq!(
            resolve_category("/entry/beam_monitor_3"),
            SourceCategory::Monitor
        );
    }
}
