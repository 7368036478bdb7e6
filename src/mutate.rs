//! Fragment reshaping: merge, split and explode.
//!
//! These are the operations the allocation driver uses to turn an
//! infeasible cluster into something assignable. Preconditions are
//! contracts, not recoverable errors; violating them means the driver or
//! the incoming liveness facts are defective, and continuing would corrupt
//! the emitted code.

use log::trace;
use smallvec::SmallVec;

use crate::fragment::{FixedReq, FragId, Location};
use crate::graph::LiveGraph;
use crate::pos::Pos;

impl LiveGraph {
    /// Absorb `b` into `a`. Defined only for textually adjacent fragments
    /// of the same vreg in the same segment (`b` starts one edge past
    /// `a`'s end). `b`'s forward links become `a`'s, with the successors'
    /// back-links repointed; location lists are concatenated, coalescing a
    /// shared boundary index into one entry; fixed requirements are
    /// concatenated in position order; `a`'s interval extends to `b`'s end.
    /// `b` is then deleted.
    pub fn merge(&mut self, a: FragId, b: FragId) {
        assert_ne!(a, b, "cannot merge a fragment with itself");
        self.debug_verify(a);
        self.debug_verify(b);

        let (a_seg, a_end, a_vreg, a_class, a_assigned) = {
            let f = &self.pool[a];
            (f.segment, f.end, f.vreg, f.class, f.assigned)
        };
        let (b_seg, b_start, b_end, b_vreg, b_class, b_assigned) = {
            let f = &self.pool[b];
            (f.segment, f.start, f.end, f.vreg, f.class, f.assigned)
        };
        assert_eq!(a_seg, b_seg, "merge operands must share a segment");
        assert_eq!(a_vreg, b_vreg, "merge operands must share a vreg");
        assert_eq!(a_class, b_class, "merge operands must share a register class");
        assert_eq!(a_end.next(), b_start, "merge operands must be adjacent");
        if let (Some(ra), Some(rb)) = (a_assigned, b_assigned) {
            assert_eq!(ra, rb, "merge operands carry conflicting assignments");
        }
        trace!("merge {} <- {} ({})", a.0, b.0, self.pool[b]);

        // a ends strictly inside the segment, so it cannot hold forward
        // links; b starts strictly inside, so it cannot hold backward links.
        debug_assert!(!self.pool[a].has_forward_links());
        debug_assert!(self.pool[b].preds.is_empty());

        // Transfer b's forward links to a, repointing back-links.
        let b_succs = std::mem::replace(&mut self.pool[b].succs, [None, None]);
        self.pool[a].succs = b_succs;
        for succ in b_succs.into_iter().flatten() {
            for p in self.pool[succ].preds.iter_mut() {
                if *p == b {
                    *p = a;
                }
            }
        }

        let b_locs = std::mem::take(&mut self.pool[b].locations);
        let b_fixed = std::mem::take(&mut self.pool[b].fixed);

        let fa = &mut self.pool[a];
        let mut b_locs = b_locs.into_iter().peekable();
        if let (Some(last), Some(first)) = (fa.locations.last_mut(), b_locs.peek())
            && last.index == first.index
        {
            // Boundary pair at the same instruction collapses to one entry.
            last.is_read |= first.is_read;
            last.is_write |= first.is_write;
            b_locs.next();
        }
        fa.locations.extend(b_locs);
        fa.fixed.extend(b_fixed);
        fa.end = b_end;
        if fa.assigned.is_none() {
            fa.assigned = b_assigned;
        }

        self.delete(b);
        self.debug_verify(a);
    }

    /// Divide `frag` at `at` into a head covering `[start, at)` that keeps
    /// the fragment's identity and a fresh tail covering `[at, end]`.
    /// Forward links (and their back-links) move to the tail; backward
    /// links stay with the head. Locations and fixed requirements below
    /// `at` stay, at-or-above move. The tail never inherits the head's
    /// assignment, so every split is a potential spill/reload boundary.
    ///
    /// With `trim_to_hole`, each half shrinks to the tightest interval
    /// around its own locations (an end pinned by a surviving cross-segment
    /// link never moves), and a half with no locations and both endpoints
    /// strictly interior is deleted. Returns the tail, or `None` if
    /// trimming deleted it.
    pub fn split(&mut self, frag: FragId, at: Pos, trim_to_hole: bool) -> Option<FragId> {
        self.debug_verify(frag);
        let (segment, vreg, class, start, end) = {
            let f = &self.pool[frag];
            (f.segment, f.vreg, f.class, f.start, f.end)
        };
        assert!(
            start < at && at <= end,
            "split point {at} outside fragment interval [{start}..{end}]"
        );
        trace!("split {} at {at} (trim: {trim_to_hole})", frag.0);

        let f = &mut self.pool[frag];
        let cut = f
            .locations
            .iter()
            .position(|l| Pos::before(l.index) >= at)
            .unwrap_or(f.locations.len());
        let tail_locs: SmallVec<[Location; 4]> = f.locations.drain(cut..).collect();
        let fcut = f
            .fixed
            .iter()
            .position(|r| r.pos >= at)
            .unwrap_or(f.fixed.len());
        let tail_fixed: SmallVec<[FixedReq; 2]> = f.fixed.drain(fcut..).collect();
        let moved_succs = std::mem::replace(&mut f.succs, [None, None]);
        f.end = at.prev();

        let tail = self.create(segment, vreg, class, at, end);
        {
            let t = &mut self.pool[tail];
            t.locations = tail_locs;
            t.fixed = tail_fixed;
            t.succs = moved_succs;
        }
        for succ in moved_succs.into_iter().flatten() {
            for p in self.pool[succ].preds.iter_mut() {
                if *p == frag {
                    *p = tail;
                }
            }
        }

        if !trim_to_hole {
            self.debug_verify(frag);
            self.debug_verify(tail);
            return Some(tail);
        }

        if self.trim_half(frag) {
            self.debug_verify(frag);
        }
        if self.trim_half(tail) {
            self.debug_verify(tail);
            Some(tail)
        } else {
            None
        }
    }

    /// Shrink one split half to the tightest interval bounding its
    /// locations. Returns false if the half was empty and got deleted.
    fn trim_half(&mut self, id: FragId) -> bool {
        let (entry, exit) = {
            let seg = self.segment(self.pool[id].segment);
            (seg.entry_pos(), seg.exit_pos())
        };
        let f = &mut self.pool[id];
        let pinned_start = !f.preds.is_empty();
        let pinned_end = f.has_forward_links();

        match (f.first_loc(), f.last_loc()) {
            (Some(first), Some(last)) => {
                if !pinned_start {
                    f.start = f.start.max(Pos::before(first.index));
                }
                if !pinned_end {
                    f.end = f.end.min(Pos::after(last.index));
                }
                true
            }
            _ => {
                // Links pin an endpoint to the segment boundary, so an
                // empty half that is pinned is never interior.
                debug_assert!(!pinned_start || f.start == entry);
                debug_assert!(!pinned_end || f.end == exit);
                if f.start > entry && f.end < exit {
                    trace!("trim deletes empty half {}", id.0);
                    self.delete(id);
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Give up on keeping `frag`'s cluster live across block boundaries:
    /// replace every member that has locations with a fresh, link-free
    /// local fragment spanning first..last location (locations and fixed
    /// requirements copied), then delete every original member. Subsequent
    /// code reloads the value on every local use.
    pub fn explode(&mut self, frag: FragId) {
        let cluster = self.cluster_of(frag);
        trace!("explode {} (cluster of {})", frag.0, cluster.len());

        for &member in &cluster {
            let f = &self.pool[member];
            let (Some(first), Some(last)) = (f.first_loc(), f.last_loc()) else {
                continue;
            };
            let (segment, vreg, class) = (f.segment, f.vreg, f.class);
            let locs = f.locations.clone();
            let fixed = f.fixed.clone();

            let local = self.create(
                segment,
                vreg,
                class,
                Pos::before(first.index),
                Pos::after(last.index),
            );
            let t = &mut self.pool[local];
            t.locations = locs;
            t.fixed = fixed;
            self.debug_verify(local);
        }

        for member in cluster {
            self.delete(member);
        }
    }
}

#[cfg(test)]
#[path = "tests/t_mutate.rs"]
mod tests;
