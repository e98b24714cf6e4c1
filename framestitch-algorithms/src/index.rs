//! Pulse index reconstruction.

/// Builds a fence-post pulse index from per-pulse event counts.
///
/// The result has `counts.len() + 1` entries, starts at 0 and ends at the
/// total number of events, so it always satisfies the event batch
/// invariants.
#[must_use]
pub fn rebuild_index(counts: &[usize]) -> Vec<u64> {
    let mut index = Vec::with_capacity(counts.len() + 1);
    let mut total = 0u64;
    index.push(total);
    for &count in counts {
        total += count as u64;
        index.push(total);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_index() {
        assert_eq!(rebuild_index(&[2, 0, 3, 1]), vec![0, 2, 2, 5, 6]);
    }

    #[test]
    fn test_rebuild_index_no_pulses() {
        assert_eq!(rebuild_index(&[]), vec![0]);
    }

    #[test]
    fn test_rebuild_index_all_empty() {
        assert_eq!(rebuild_index(&[0, 0, 0]), vec![0, 0, 0, 0]);
    }
}
