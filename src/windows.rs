//! Raises candidate rolling windows to the sampling-period floor.

use std::collections::BTreeSet;

use crate::period::Period;

/// `max(floor, candidate)` for every candidate, deduplicated and ordered.
pub fn validate_window_sizes(floor_seconds: u64, candidates: &[u64]) -> BTreeSet<u64> {
    candidates
        .iter()
        .map(|candidate| floor_seconds.max(*candidate))
        .collect()
}

/// Same rule over parsed periods. A zero floor leaves candidates unchanged.
pub fn validate_windows(floor_seconds: u64, candidates: &[Period]) -> BTreeSet<Period> {
    candidates
        .iter()
        .map(|candidate| match Period::from_seconds(floor_seconds) {
            Ok(floor) => floor.max(*candidate),
            Err(_) => *candidate,
        })
        .collect()
}
