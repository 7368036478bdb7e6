//! The live-range graph: segments, the fragment pool, cross-segment link
//! maintenance and cluster traversal.

use std::collections::VecDeque;
use std::fmt;

use log::trace;
use smallvec::SmallVec;

use crate::fragment::{FragId, Fragment, PhysReg, RegClass, VregId};
use crate::pos::Pos;
use crate::segment::{Branch, Segment, SegmentId};
use crate::store::FragmentPool;

/// Live-range state for one compiled function. All mutation goes through
/// this type so the forward/backward link pairing and the per-segment
/// indexes stay consistent.
#[derive(Debug, Default)]
pub struct LiveGraph {
    segments: Vec<Segment>,
    pub(crate) pool: FragmentPool,
    /// Per-graph traversal epoch; see [`LiveGraph::cluster_of`].
    epoch: u64,
}

impl LiveGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_segment(&mut self, inst_count: u32, loop_depth: u32) -> SegmentId {
        let id = SegmentId(self.segments.len() as u32);
        self.segments.push(Segment::new(id, inst_count, loop_depth));
        id
    }

    /// Record the statically known block edge `from --branch--> to`.
    /// Each branch direction of a segment connects at most once.
    pub fn connect(&mut self, from: SegmentId, branch: Branch, to: SegmentId) {
        self.segments[from.index()].set_succ(branch, to);
        self.segments[to.index()].add_pred(from);
    }

    #[inline]
    pub fn segment(&self, id: SegmentId) -> &Segment {
        &self.segments[id.index()]
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[inline]
    pub fn fragment(&self, id: FragId) -> &Fragment {
        &self.pool[id]
    }

    /// Mutable fragment access, for the producer to record uses and for the
    /// driver to settle assignments. Structural fields (links, indexes) must
    /// only change through graph operations.
    #[inline]
    pub fn fragment_mut(&mut self, id: FragId) -> &mut Fragment {
        &mut self.pool[id]
    }

    /// Iterate over all live fragments.
    pub fn fragments(&self) -> impl Iterator<Item = (FragId, &Fragment)> {
        self.pool.iter()
    }

    pub fn fragment_count(&self) -> usize {
        self.pool.len()
    }

    /// Allocate a fragment covering `[start, end]` of `segment` and register
    /// it in the segment's indexes (prepended to the vreg chain). The new
    /// fragment has no links and no assignment.
    pub fn create(
        &mut self,
        segment: SegmentId,
        vreg: VregId,
        class: RegClass,
        start: Pos,
        end: Pos,
    ) -> FragId {
        let seg = &self.segments[segment.index()];
        assert!(start <= end, "fragment interval is inverted");
        assert!(
            end <= seg.exit_pos(),
            "fragment interval extends past the segment"
        );
        let mut frag = Fragment::new(segment, vreg, class, start, end);
        frag.next_local = seg.vreg_head(vreg);
        let id = self.pool.alloc(frag);

        let seg = &mut self.segments[segment.index()];
        seg.frags.push(id);
        seg.by_vreg.insert(vreg, id);
        self.debug_verify(id);
        id
    }

    /// Delete `id`, severing every forward/backward link pair it takes part
    /// in and unregistering it from its segment's indexes. The slot returns
    /// to the pool's free list.
    pub fn delete(&mut self, id: FragId) {
        let (segment, vreg, next_local, succs) = {
            let f = &self.pool[id];
            (f.segment, f.vreg, f.next_local, f.succs)
        };
        trace!("delete {} ({})", id.0, self.pool[id]);

        // Sever link pairs in both directions.
        for succ in succs.into_iter().flatten() {
            self.pool[succ].preds.retain(|p| *p != id);
        }
        let preds = std::mem::take(&mut self.pool[id].preds);
        for pred in preds {
            for slot in self.pool[pred].succs.iter_mut() {
                if *slot == Some(id) {
                    *slot = None;
                }
            }
        }

        // Unlink from the segment's vreg chain.
        let head = self.segments[segment.index()].vreg_head(vreg);
        match head {
            Some(h) if h == id => {
                let seg = &mut self.segments[segment.index()];
                match next_local {
                    Some(next) => {
                        seg.by_vreg.insert(vreg, next);
                    }
                    None => {
                        seg.by_vreg.swap_remove(&vreg);
                    }
                }
            }
            Some(mut cur) => {
                loop {
                    let next = self.pool[cur]
                        .next_local
                        .expect("fragment missing from its vreg chain");
                    if next == id {
                        break;
                    }
                    cur = next;
                }
                self.pool[cur].next_local = next_local;
            }
            None => panic!("fragment's vreg not present in segment index"),
        }

        self.segments[segment.index()].frags.retain(|f| *f != id);
        self.pool.free(id);
    }

    /// Establish the forward/backward link pair `from --branch--> to`,
    /// recording that the vreg's liveness continues past the block boundary.
    /// `from` must end on its segment's exit edge, `to` must start on its
    /// segment's entry edge, and `to` must live in the successor segment
    /// that `branch` leads to.
    pub fn link(&mut self, from: FragId, branch: Branch, to: FragId) {
        let (from_seg, from_end, from_vreg) = {
            let f = &self.pool[from];
            (f.segment, f.end, f.vreg)
        };
        let (to_seg, to_start, to_vreg) = {
            let f = &self.pool[to];
            (f.segment, f.start, f.vreg)
        };
        let succ_seg = self.segments[from_seg.index()]
            .succ(branch)
            .expect("no block edge in that branch direction");
        assert_eq!(succ_seg, to_seg, "forward link must target the successor segment");
        assert_eq!(from_vreg, to_vreg, "linked fragments must share a vreg");
        assert_eq!(
            from_end,
            self.segments[from_seg.index()].exit_pos(),
            "forward-linked fragment must end on the exit edge"
        );
        assert_eq!(
            to_start,
            self.segments[to_seg.index()].entry_pos(),
            "backward-linked fragment must start on the entry edge"
        );

        let slot = &mut self.pool[from].succs[branch.index()];
        assert!(slot.is_none(), "forward link already set in that direction");
        *slot = Some(to);
        self.pool[to].preds.push(from);
        self.debug_verify(from);
        self.debug_verify(to);
    }

    /// The connected component of fragments reachable from `start` via
    /// forward and backward links. The block graph may contain loops, so
    /// visited state is a per-graph epoch stamped into each slot, keeping
    /// the walk allocation-light and O(cluster size). Order is not
    /// significant.
    pub fn cluster_of(&mut self, start: FragId) -> Vec<FragId> {
        self.epoch += 1;
        let epoch = self.epoch;

        let mut cluster = Vec::new();
        let mut work = VecDeque::new();
        self.pool.stamp(start, epoch);
        work.push_back(start);

        while let Some(id) = work.pop_front() {
            cluster.push(id);
            let frag = &self.pool[id];
            let mut neighbors: SmallVec<[FragId; 4]> = SmallVec::new();
            neighbors.extend(frag.succs.into_iter().flatten());
            neighbors.extend(frag.preds.iter().copied());
            for n in neighbors {
                if self.pool.stamp(n, epoch) {
                    work.push_back(n);
                }
            }
        }
        cluster
    }

    /// Emitter-facing query: the physical register holding `vreg` at
    /// instruction `index` of `segment`, or `None` if the value is not
    /// register-resident there and must be reloaded.
    pub fn assignment_at(&self, segment: SegmentId, vreg: VregId, index: u32) -> Option<PhysReg> {
        let mut cur = self.segments[segment.index()].vreg_head(vreg);
        while let Some(id) = cur {
            let f = &self.pool[id];
            if f.covers(index) {
                return f.assigned;
            }
            cur = f.next_local;
        }
        None
    }

    #[cfg(debug_assertions)]
    pub(crate) fn debug_verify(&self, id: FragId) {
        if let Err(err) = crate::verify::verify_fragment(self, id) {
            panic!("live-range invariant violated: {err}");
        }
    }

    #[cfg(not(debug_assertions))]
    pub(crate) fn debug_verify(&self, _id: FragId) {}
}

/// Pretty-prints a graph's fragments per segment in a stable order.
pub struct GraphDisplay<'a>(pub &'a LiveGraph);

impl fmt::Display for GraphDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in self.0.segments() {
            for &id in seg.fragments() {
                if !first {
                    writeln!(f)?;
                }
                first = false;
                write!(f, "{}: {}", id.0, self.0.fragment(id))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/t_graph.rs"]
mod tests;
