//! The `when` matcher: successive equi-joins of patterns over the log.

use std::sync::Arc;

use concord_core::{Fields, InvocationRecord};

use crate::frame::{Frame, Frames};
use crate::pattern::Pattern;

/// Match an ordered list of patterns against `records`.
///
/// Patterns are processed left to right. Every frame produced so far is
/// joined with every record that fits the next pattern under that frame's
/// bindings; frames with no fitting record are dropped. Two patterns may
/// match the same record.
pub fn match_when(
    patterns: &[Pattern],
    records: &[InvocationRecord],
    var_count: usize,
    original_input: &Arc<Fields>,
) -> Frames {
    let mut frames = vec![Frame::empty(var_count, Arc::clone(original_input))];
    for pattern in patterns {
        let mut joined = Vec::new();
        for frame in &frames {
            joined.extend(records.iter().filter_map(|record| pattern.unify(record, frame)));
        }
        frames = joined;
        if frames.is_empty() {
            break;
        }
    }
    frames.into_iter().collect()
}

/// Like [`match_when`], but keeps only frames that use at least one record
/// with `seq >= frontier`.
///
/// Each combination of records is therefore considered in exactly one
/// round: the first round in which all of its records exist.
pub fn match_frontier(
    patterns: &[Pattern],
    records: &[InvocationRecord],
    var_count: usize,
    original_input: &Arc<Fields>,
    frontier: u64,
) -> Frames {
    match_when(patterns, records, var_count, original_input)
        .filter(|frame| frame.provenance().iter().any(|&seq| seq >= frontier))
}
