use crate::fragment::{FragId, PhysReg, PhysRegSet, RegClass, VregId};
use crate::graph::LiveGraph;
use crate::pos::Pos;
use crate::segment::{Branch, SegmentId};
use crate::verify::verify_graph;

const GP: RegClass = RegClass(0);
const V0: VregId = VregId(0);

fn single_block(inst_count: u32) -> (LiveGraph, SegmentId) {
    let mut g = LiveGraph::new();
    let s0 = g.add_segment(inst_count, 0);
    (g, s0)
}

fn full_span(g: &mut LiveGraph, seg: SegmentId, vreg: VregId) -> FragId {
    let (entry, exit) = {
        let s = g.segment(seg);
        (s.entry_pos(), s.exit_pos())
    };
    g.create(seg, vreg, GP, entry, exit)
}

// --- merge ---

#[test]
fn test_merge_concatenates_locations_and_extends_interval() {
    let (mut g, s0) = single_block(12);
    let a = g.create(s0, V0, GP, Pos::before(0), Pos::after(5));
    let b = g.create(s0, V0, GP, Pos::before(6), Pos::after(11));
    g.fragment_mut(a).record_use(1, false, true);
    g.fragment_mut(a).record_use(4, true, false);
    g.fragment_mut(b).record_use(7, true, false);

    g.merge(a, b);

    let f = g.fragment(a);
    assert_eq!(f.start, Pos::before(0));
    assert_eq!(f.end, Pos::after(11));
    let indices: Vec<u32> = f.locations.iter().map(|l| l.index).collect();
    assert_eq!(indices, vec![1, 4, 7]);
    assert_eq!(g.fragment_count(), 1);
    verify_graph(&g).unwrap();
}

#[test]
fn test_merge_coalesces_boundary_location() {
    // a ends with a write at 9, b starts with a read at 9: the merged
    // fragment gets one read+write entry, not two.
    let (mut g, s0) = single_block(16);
    let a = g.create(s0, V0, GP, Pos::before(0), Pos::before(9));
    let b = g.create(s0, V0, GP, Pos::after(9), Pos::after(15));
    g.fragment_mut(a).record_use(9, false, true);
    g.fragment_mut(b).record_use(9, true, false);

    g.merge(a, b);

    let f = g.fragment(a);
    assert_eq!(f.locations.len(), 1);
    let loc = f.locations[0];
    assert_eq!(loc.index, 9);
    assert!(loc.is_read && loc.is_write);
    verify_graph(&g).unwrap();
}

#[test]
fn test_merge_transfers_forward_links() {
    let mut g = LiveGraph::new();
    let s0 = g.add_segment(8, 0);
    let s1 = g.add_segment(4, 0);
    g.connect(s0, Branch::Taken, s1);

    let a = g.create(s0, V0, GP, Pos::before(0), Pos::after(3));
    let b = g.create(s0, V0, GP, Pos::before(4), Pos::after(7));
    let next = full_span(&mut g, s1, V0);
    g.link(b, Branch::Taken, next);

    g.merge(a, b);

    assert_eq!(g.fragment(a).succs[Branch::Taken.index()], Some(next));
    assert_eq!(g.fragment(next).preds.as_slice(), &[a]);
    let mut cluster = g.cluster_of(a);
    cluster.sort_by_key(|f| f.0);
    assert_eq!(cluster, vec![a, next]);
    verify_graph(&g).unwrap();
}

#[test]
fn test_merge_concatenates_fixed_reqs() {
    let (mut g, s0) = single_block(10);
    let a = g.create(s0, V0, GP, Pos::before(0), Pos::after(4));
    let b = g.create(s0, V0, GP, Pos::before(5), Pos::after(9));
    g.fragment_mut(a)
        .add_fixed(Pos::before(2), PhysRegSet::single(PhysReg(0)));
    g.fragment_mut(b)
        .add_fixed(Pos::before(7), PhysRegSet::single(PhysReg(1)));

    g.merge(a, b);

    let f = g.fragment(a);
    assert_eq!(f.fixed.len(), 2);
    assert_eq!(f.fixed[0].pos, Pos::before(2));
    assert_eq!(f.fixed[1].pos, Pos::before(7));
}

#[test]
fn test_merge_keeps_head_assignment() {
    let (mut g, s0) = single_block(10);
    let a = g.create(s0, V0, GP, Pos::before(0), Pos::after(4));
    let b = g.create(s0, V0, GP, Pos::before(5), Pos::after(9));
    g.fragment_mut(a).assigned = Some(PhysReg(3));

    g.merge(a, b);
    assert_eq!(g.fragment(a).assigned, Some(PhysReg(3)));
}

#[test]
#[should_panic(expected = "adjacent")]
fn test_merge_non_adjacent_panics() {
    let (mut g, s0) = single_block(12);
    let a = g.create(s0, V0, GP, Pos::before(0), Pos::after(3));
    let b = g.create(s0, V0, GP, Pos::before(8), Pos::after(11));
    g.merge(a, b);
}

#[test]
#[should_panic(expected = "share a segment")]
fn test_merge_cross_segment_panics() {
    let mut g = LiveGraph::new();
    let s0 = g.add_segment(4, 0);
    let s1 = g.add_segment(4, 0);
    let a = full_span(&mut g, s0, V0);
    let b = full_span(&mut g, s1, V0);
    g.merge(a, b);
}

#[test]
#[should_panic(expected = "conflicting assignments")]
fn test_merge_conflicting_assignment_panics() {
    let (mut g, s0) = single_block(10);
    let a = g.create(s0, V0, GP, Pos::before(0), Pos::after(4));
    let b = g.create(s0, V0, GP, Pos::before(5), Pos::after(9));
    g.fragment_mut(a).assigned = Some(PhysReg(1));
    g.fragment_mut(b).assigned = Some(PhysReg(2));
    g.merge(a, b);
}

// --- split ---

#[test]
fn test_split_partitions_locations() {
    // Locations {2: write, 5: read}, split at 4: head keeps the write,
    // tail keeps the read.
    let (mut g, s0) = single_block(8);
    let f = g.create(s0, V0, GP, Pos::before(0), Pos::after(7));
    g.fragment_mut(f).record_use(2, false, true);
    g.fragment_mut(f).record_use(5, true, false);

    let tail = g.split(f, Pos::before(4), false).unwrap();

    let head = g.fragment(f);
    assert_eq!(head.start, Pos::before(0));
    assert_eq!(head.end, Pos::before(4).prev());
    assert_eq!(head.locations.len(), 1);
    assert_eq!(head.locations[0].index, 2);
    assert!(head.locations[0].is_write);

    let t = g.fragment(tail);
    assert_eq!(t.start, Pos::before(4));
    assert_eq!(t.end, Pos::after(7));
    assert_eq!(t.locations.len(), 1);
    assert_eq!(t.locations[0].index, 5);
    assert!(t.locations[0].is_read);
    verify_graph(&g).unwrap();
}

#[test]
fn test_split_tail_drops_assignment() {
    let (mut g, s0) = single_block(8);
    let f = g.create(s0, V0, GP, Pos::before(0), Pos::after(7));
    g.fragment_mut(f).assigned = Some(PhysReg(2));

    let tail = g.split(f, Pos::before(4), false).unwrap();

    // The head keeps its register; the tail is a reload boundary.
    assert_eq!(g.fragment(f).assigned, Some(PhysReg(2)));
    assert_eq!(g.fragment(tail).assigned, None);
}

#[test]
fn test_split_moves_forward_links_to_tail() {
    let mut g = LiveGraph::new();
    let s0 = g.add_segment(8, 0);
    let s1 = g.add_segment(4, 0);
    g.connect(s0, Branch::Taken, s1);

    let f = full_span(&mut g, s0, V0);
    let next = full_span(&mut g, s1, V0);
    g.link(f, Branch::Taken, next);

    let tail = g.split(f, Pos::before(4), false).unwrap();

    assert!(!g.fragment(f).has_forward_links());
    assert_eq!(g.fragment(tail).succs[Branch::Taken.index()], Some(next));
    assert_eq!(g.fragment(next).preds.as_slice(), &[tail]);
    verify_graph(&g).unwrap();
}

#[test]
fn test_split_keeps_backward_links_on_head() {
    let mut g = LiveGraph::new();
    let s0 = g.add_segment(4, 0);
    let s1 = g.add_segment(8, 0);
    g.connect(s0, Branch::Taken, s1);

    let prev = full_span(&mut g, s0, V0);
    let f = full_span(&mut g, s1, V0);
    g.link(prev, Branch::Taken, f);

    let tail = g.split(f, Pos::before(4), false).unwrap();

    assert_eq!(g.fragment(f).preds.as_slice(), &[prev]);
    assert!(g.fragment(tail).preds.is_empty());
    assert_eq!(g.fragment(prev).succs[Branch::Taken.index()], Some(f));
    verify_graph(&g).unwrap();
}

#[test]
fn test_split_partitions_fixed_reqs() {
    let (mut g, s0) = single_block(8);
    let f = g.create(s0, V0, GP, Pos::before(0), Pos::after(7));
    g.fragment_mut(f)
        .add_fixed(Pos::before(1), PhysRegSet::single(PhysReg(0)));
    g.fragment_mut(f)
        .add_fixed(Pos::after(6), PhysRegSet::single(PhysReg(1)));

    let tail = g.split(f, Pos::before(4), false).unwrap();

    assert_eq!(g.fragment(f).fixed.len(), 1);
    assert_eq!(g.fragment(f).fixed[0].pos, Pos::before(1));
    assert_eq!(g.fragment(tail).fixed.len(), 1);
    assert_eq!(g.fragment(tail).fixed[0].pos, Pos::after(6));
}

#[test]
fn test_split_then_merge_round_trips() {
    let (mut g, s0) = single_block(10);
    let f = g.create(s0, V0, GP, Pos::before(0), Pos::after(9));
    g.fragment_mut(f).record_use(1, false, true);
    g.fragment_mut(f).record_use(4, true, false);
    g.fragment_mut(f).record_use(8, true, false);
    g.fragment_mut(f)
        .add_fixed(Pos::before(4), PhysRegSet::single(PhysReg(0)));
    g.fragment_mut(f).assigned = Some(PhysReg(5));
    let before_locs = g.fragment(f).locations.clone();
    let before_fixed = g.fragment(f).fixed.clone();

    let tail = g.split(f, Pos::before(3), false).unwrap();
    g.merge(f, tail);

    let after = g.fragment(f);
    assert_eq!(after.start, Pos::before(0));
    assert_eq!(after.end, Pos::after(9));
    assert_eq!(after.locations, before_locs);
    assert_eq!(after.fixed, before_fixed);
    // The head's assignment survives the round trip.
    assert_eq!(after.assigned, Some(PhysReg(5)));
    assert_eq!(g.fragment_count(), 1);
    verify_graph(&g).unwrap();
}

#[test]
fn test_split_trim_shrinks_to_locations() {
    let (mut g, s0) = single_block(12);
    let f = g.create(s0, V0, GP, Pos::before(0), Pos::after(11));
    g.fragment_mut(f).record_use(2, false, true);
    g.fragment_mut(f).record_use(9, true, false);

    let tail = g.split(f, Pos::before(5), true).unwrap();

    // Each half hugs its own activity.
    assert_eq!(g.fragment(f).start, Pos::before(2));
    assert_eq!(g.fragment(f).end, Pos::after(2));
    assert_eq!(g.fragment(tail).start, Pos::before(9));
    assert_eq!(g.fragment(tail).end, Pos::after(9));
    verify_graph(&g).unwrap();
}

#[test]
fn test_split_trim_deletes_empty_interior_tail() {
    let (mut g, s0) = single_block(12);
    // Fragment ends mid-block with all activity in the head part.
    let f = g.create(s0, V0, GP, Pos::before(0), Pos::after(10));
    g.fragment_mut(f).record_use(1, false, true);

    let tail = g.split(f, Pos::before(5), true);

    assert!(tail.is_none(), "empty interior tail must be deleted");
    assert_eq!(g.fragment_count(), 1);
    verify_graph(&g).unwrap();
}

#[test]
fn test_split_trim_keeps_link_pinned_end() {
    let mut g = LiveGraph::new();
    let s0 = g.add_segment(8, 0);
    let s1 = g.add_segment(4, 0);
    g.connect(s0, Branch::Taken, s1);

    let f = full_span(&mut g, s0, V0);
    let next = full_span(&mut g, s1, V0);
    g.link(f, Branch::Taken, next);
    g.fragment_mut(f).record_use(1, false, true);
    g.fragment_mut(f).record_use(6, true, false);

    let tail = g.split(f, Pos::before(4), true).unwrap();

    // The tail's end is pinned by its surviving forward link even though
    // its last location is at 6.
    assert_eq!(g.fragment(tail).end, g.segment(s0).exit_pos());
    assert_eq!(g.fragment(tail).start, Pos::before(6));
    verify_graph(&g).unwrap();
}

#[test]
#[should_panic(expected = "outside fragment interval")]
fn test_split_outside_interval_panics() {
    let (mut g, s0) = single_block(8);
    let f = g.create(s0, V0, GP, Pos::before(2), Pos::after(5));
    g.split(f, Pos::before(7), false);
}

#[test]
fn test_locations_stay_sorted_through_mutations() {
    let (mut g, s0) = single_block(16);
    let f = g.create(s0, V0, GP, Pos::before(0), Pos::after(15));
    for i in [1, 4, 7, 10, 13] {
        g.fragment_mut(f).record_use(i, true, i % 2 == 0);
    }

    let assert_sorted = |g: &LiveGraph, id: FragId| {
        let locs = &g.fragment(id).locations;
        for pair in locs.windows(2) {
            assert!(pair[0].index < pair[1].index);
        }
    };

    let tail = g.split(f, Pos::before(8), false).unwrap();
    assert_sorted(&g, f);
    assert_sorted(&g, tail);

    g.merge(f, tail);
    assert_sorted(&g, f);
}

// --- explode ---

#[test]
fn test_explode_localizes_cluster() {
    let mut g = LiveGraph::new();
    let s0 = g.add_segment(8, 0);
    let s1 = g.add_segment(8, 0);
    g.connect(s0, Branch::Taken, s1);

    let f0 = full_span(&mut g, s0, V0);
    let f1 = full_span(&mut g, s1, V0);
    g.link(f0, Branch::Taken, f1);
    g.fragment_mut(f0).record_use(2, false, true);
    g.fragment_mut(f0).record_use(5, true, false);
    g.fragment_mut(f1).record_use(3, true, false);

    g.explode(f0);

    // Two replacement fragments, no cross-segment links anywhere.
    assert_eq!(g.fragment_count(), 2);
    for (id, frag) in g.fragments() {
        assert!(!frag.has_forward_links(), "fragment {} kept a link", id.0);
        assert!(frag.preds.is_empty());
    }

    // Each replacement hugs its locations.
    let local0 = g.segment(s0).vreg_head(V0).unwrap();
    assert_eq!(g.fragment(local0).start, Pos::before(2));
    assert_eq!(g.fragment(local0).end, Pos::after(5));
    let indices: Vec<u32> = g.fragment(local0).locations.iter().map(|l| l.index).collect();
    assert_eq!(indices, vec![2, 5]);

    let local1 = g.segment(s1).vreg_head(V0).unwrap();
    assert_eq!(g.fragment(local1).start, Pos::before(3));
    assert_eq!(g.fragment(local1).end, Pos::after(3));
    verify_graph(&g).unwrap();
}

#[test]
fn test_explode_drops_location_free_members() {
    let mut g = LiveGraph::new();
    let s0 = g.add_segment(4, 0);
    let s1 = g.add_segment(4, 0);
    let s2 = g.add_segment(4, 0);
    g.connect(s0, Branch::Taken, s1);
    g.connect(s1, Branch::Taken, s2);

    // The middle fragment is pure pass-through liveness.
    let f0 = full_span(&mut g, s0, V0);
    let f1 = full_span(&mut g, s1, V0);
    let f2 = full_span(&mut g, s2, V0);
    g.link(f0, Branch::Taken, f1);
    g.link(f1, Branch::Taken, f2);
    g.fragment_mut(f0).record_use(0, false, true);
    g.fragment_mut(f2).record_use(3, true, false);

    g.explode(f1);

    // Only the two segments with activity get replacements.
    assert_eq!(g.fragment_count(), 2);
    assert!(g.segment(s1).fragments().is_empty());
    verify_graph(&g).unwrap();
}

#[test]
fn test_explode_preserves_location_union() {
    let mut g = LiveGraph::new();
    let s0 = g.add_segment(8, 0);
    let s1 = g.add_segment(8, 0);
    g.connect(s0, Branch::Taken, s1);

    let f0 = full_span(&mut g, s0, V0);
    let f1 = full_span(&mut g, s1, V0);
    g.link(f0, Branch::Taken, f1);
    g.fragment_mut(f0).record_use(1, false, true);
    g.fragment_mut(f1).record_use(2, true, false);
    g.fragment_mut(f1).record_use(6, true, true);

    let mut before: Vec<(u32, u32)> = g
        .fragments()
        .flat_map(|(_, f)| f.locations.iter().map(|l| (f.segment.0, l.index)))
        .collect();
    before.sort_unstable();

    g.explode(f0);

    let mut after: Vec<(u32, u32)> = g
        .fragments()
        .flat_map(|(_, f)| f.locations.iter().map(|l| (f.segment.0, l.index)))
        .collect();
    after.sort_unstable();
    assert_eq!(before, after);
}
