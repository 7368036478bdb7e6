//! Segments: basic blocks with statically known successors, plus the
//! per-block fragment indexes.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::fragment::{FragId, VregId};
use crate::pos::Pos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentId(pub u32);

impl SegmentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Branch direction out of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Taken,
    NotTaken,
}

impl Branch {
    pub const ALL: [Branch; 2] = [Branch::Taken, Branch::NotTaken];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Branch::Taken => 0,
            Branch::NotTaken => 1,
        }
    }
}

/// One basic block. Successor pointers are immutable once connected; the
/// cross-segment fragment links must always agree with them.
#[derive(Debug)]
pub struct Segment {
    pub id: SegmentId,
    pub inst_count: u32,
    pub loop_depth: u32,
    succs: [Option<SegmentId>; 2],
    preds: SmallVec<[SegmentId; 2]>,
    /// Every fragment created in this segment, in creation order.
    pub(crate) frags: Vec<FragId>,
    /// Head of the per-vreg fragment chain (newest first).
    pub(crate) by_vreg: IndexMap<VregId, FragId>,
}

impl Segment {
    pub(crate) fn new(id: SegmentId, inst_count: u32, loop_depth: u32) -> Self {
        assert!(inst_count > 0, "segment must contain at least one instruction");
        Self {
            id,
            inst_count,
            loop_depth,
            succs: [None, None],
            preds: SmallVec::new(),
            frags: Vec::new(),
            by_vreg: IndexMap::new(),
        }
    }

    /// The entry edge of the block.
    #[inline]
    pub fn entry_pos(&self) -> Pos {
        Pos::before(0)
    }

    /// The exit edge of the block.
    #[inline]
    pub fn exit_pos(&self) -> Pos {
        Pos::after(self.inst_count - 1)
    }

    #[inline]
    pub fn succ(&self, branch: Branch) -> Option<SegmentId> {
        self.succs[branch.index()]
    }

    pub fn preds(&self) -> &[SegmentId] {
        &self.preds
    }

    /// All fragments that start in this segment, in creation order.
    pub fn fragments(&self) -> &[FragId] {
        &self.frags
    }

    /// Head of the fragment chain for `vreg` in this segment, if any.
    pub fn vreg_head(&self, vreg: VregId) -> Option<FragId> {
        self.by_vreg.get(&vreg).copied()
    }

    pub(crate) fn set_succ(&mut self, branch: Branch, to: SegmentId) {
        let slot = &mut self.succs[branch.index()];
        assert!(slot.is_none(), "segment successor already connected");
        *slot = Some(to);
    }

    pub(crate) fn add_pred(&mut self, from: SegmentId) {
        self.preds.push(from);
    }
}
