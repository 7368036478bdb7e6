//! Spill-cost heuristics.
//!
//! The allocation driver uses these estimators to choose between keeping a
//! cluster global, splitting it, or exploding it into local-only fragments.
//! Costs are model units, not cycles; only their relative order matters.

use crate::fragment::FragId;
use crate::graph::LiveGraph;
use crate::pos::Pos;
use crate::segment::SegmentId;

/// Spill traffic penalty for one segment: `((loop_depth + 1) * 5)^2`.
/// Deliberately super-linear so traffic inside nested loops is modeled as
/// disproportionately expensive.
pub fn segment_cost(graph: &LiveGraph, segment: SegmentId) -> u32 {
    let depth = graph.segment(segment).loop_depth;
    ((depth + 1) * 5).pow(2)
}

/// Approximate total spill traffic for a cluster.
///
/// Takes the max (not the sum) of segment costs over the cluster's entry
/// points (members whose start is not cross-segment) and likewise over its
/// exit points, because structurally-parallel entries and exits share one
/// spill decision and should not be charged once per branch. A small
/// `(entries + exits) / 10` term breaks ties toward clusters with fewer
/// boundary points.
pub fn cluster_cost(graph: &LiveGraph, cluster: &[FragId]) -> u32 {
    let mut entry_max = 0;
    let mut exit_max = 0;
    let mut entries = 0;
    let mut exits = 0;

    for &id in cluster {
        let frag = graph.fragment(id);
        let cost = segment_cost(graph, frag.segment);
        if frag.preds.is_empty() {
            entries += 1;
            entry_max = entry_max.max(cost);
        }
        if !frag.has_forward_links() {
            exits += 1;
            exit_max = exit_max.max(cost);
        }
    }
    entry_max + exit_max + (entries + exits) / 10
}

/// Estimated cost delta of calling [`LiveGraph::explode`] on `frag`'s
/// cluster: the cluster's global cost minus twice the per-segment cost of
/// every member that would survive as a local fragment. Negative when
/// exploding would make things worse.
pub fn explode_gain(graph: &mut LiveGraph, frag: FragId) -> i64 {
    let cluster = graph.cluster_of(frag);
    let global = cluster_cost(graph, &cluster) as i64;
    let local: i64 = cluster
        .iter()
        .filter(|&&m| graph.fragment(m).has_locations())
        .map(|&m| segment_cost(graph, graph.fragment(m).segment) as i64 * 2)
        .sum();
    global - local
}

/// Estimated benefit of splitting `frag` at `at`: twice the segment cost if
/// `at` falls strictly inside the fragment's location range (so both halves
/// keep activity), else zero.
pub fn split_gain(graph: &LiveGraph, frag: FragId, at: Pos) -> u32 {
    let f = graph.fragment(frag);
    let (Some(first), Some(last)) = (f.first_loc(), f.last_loc()) else {
        return 0;
    };
    if Pos::before(first.index) < at && at <= Pos::before(last.index) {
        segment_cost(graph, f.segment) * 2
    } else {
        0
    }
}

#[cfg(test)]
#[path = "tests/t_cost.rs"]
mod tests;
