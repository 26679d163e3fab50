//! Structural search for place-shaped subtrees.

use placescout_core::WireLayout;
use serde_json::Value;

/// True when `items` looks like a place record: longer than the metadata
/// threshold, with an array of at least two elements in the coordinate slot.
pub(crate) fn is_place_shaped(items: &[Value], layout: &WireLayout) -> bool {
    items.len() > layout.min_candidate_len
        && matches!(items.get(layout.coordinate_slot), Some(Value::Array(block)) if block.len() >= 2)
}

/// Return the place array held by `value`, unwrapping `[null, place, ...]`.
pub(crate) fn as_candidate<'a>(value: &'a Value, layout: &WireLayout) -> Option<&'a [Value]> {
    let items = value.as_array()?;
    if is_place_shaped(items, layout) {
        return Some(items);
    }
    match items.as_slice() {
        [Value::Null, Value::Array(inner), ..] if is_place_shaped(inner, layout) => Some(inner),
        _ => None,
    }
}

/// Candidates found by [`find_candidates`].
#[derive(Debug, Default)]
pub(crate) struct CandidateScan<'a> {
    pub candidates: Vec<&'a [Value]>,
    /// Some subtree was cut off by the depth bound
    pub truncated: bool,
}

/// Depth-bounded, document-order search. A candidate's own children are not
/// searched.
pub(crate) fn find_candidates<'a>(root: &'a Value, layout: &WireLayout) -> CandidateScan<'a> {
    let mut outcome = CandidateScan::default();
    walk(root, 0, layout, &mut outcome);
    outcome
}

fn walk<'a>(value: &'a Value, depth: usize, layout: &WireLayout, out: &mut CandidateScan<'a>) {
    let Value::Array(items) = value else {
        return;
    };
    if let Some(candidate) = as_candidate(value, layout) {
        out.candidates.push(candidate);
        return;
    }
    if depth >= layout.max_search_depth {
        if items.iter().any(Value::is_array) {
            out.truncated = true;
        }
        return;
    }
    for child in items {
        walk(child, depth + 1, layout, out);
    }
}
