//! The live-range fragment: one contiguous per-block span of liveness for
//! one virtual register, together with its uses and fixed-register
//! constraints.

use std::fmt;

use smallvec::SmallVec;

use crate::pos::Pos;
use crate::segment::SegmentId;

/// Handle to a fragment slot in the graph's pool. Stable for the lifetime
/// of the fragment; must not be used after `delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragId(pub u32);

impl FragId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Virtual register id, as numbered by the instruction-selection stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VregId(pub u32);

impl VregId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Register-class tag selecting which physical pool a fragment may be
/// assigned from (general-purpose, floating-point, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegClass(pub u8);

/// A physical machine register, numbered within its class pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysReg(pub u8);

impl fmt::Display for PhysReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Bit set of physical registers within one class pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhysRegSet(pub u64);

impl PhysRegSet {
    pub const EMPTY: PhysRegSet = PhysRegSet(0);

    #[inline]
    pub fn single(reg: PhysReg) -> Self {
        PhysRegSet(1u64 << reg.0)
    }

    #[inline]
    pub fn contains(self, reg: PhysReg) -> bool {
        self.0 & (1u64 << reg.0) != 0
    }

    #[inline]
    pub fn insert(&mut self, reg: PhysReg) {
        self.0 |= 1u64 << reg.0;
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn len(self) -> u32 {
        self.0.count_ones()
    }
}

/// One place the virtual register is touched inside a fragment's interval.
/// A read and a write at the same instruction share a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub index: u32,
    pub is_read: bool,
    pub is_write: bool,
}

/// A position where an instruction pins the virtual register to a specific
/// set of physical registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedReq {
    pub pos: Pos,
    pub allowed: PhysRegSet,
}

/// One contiguous span of liveness for one virtual register inside one
/// segment, covering the closed interval `[start, end]` in position space.
///
/// Cross-segment liveness is modeled by pairing a forward link (per branch
/// direction) with a backward link on the target fragment; the two always
/// exist together, and a linked fragment touches the corresponding segment
/// boundary.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub segment: SegmentId,
    pub vreg: VregId,
    pub class: RegClass,
    pub start: Pos,
    pub end: Pos,
    /// Physical register the driver settled on, if any. `None` means the
    /// value is not register-resident here and uses must reload.
    pub assigned: Option<PhysReg>,
    /// Sorted by ascending instruction index, no duplicate indices.
    pub locations: SmallVec<[Location; 4]>,
    /// Sorted by ascending position.
    pub fixed: SmallVec<[FixedReq; 2]>,
    /// Forward link per branch direction, into the successor segment.
    pub succs: [Option<FragId>; 2],
    /// Backward links: every fragment holding a forward link to this one.
    pub preds: SmallVec<[FragId; 2]>,
    /// Next fragment of the same vreg in the same segment (newest first;
    /// the head lives in the segment's vreg index).
    pub next_local: Option<FragId>,
}

impl Fragment {
    pub(crate) fn new(
        segment: SegmentId,
        vreg: VregId,
        class: RegClass,
        start: Pos,
        end: Pos,
    ) -> Self {
        Self {
            segment,
            vreg,
            class,
            start,
            end,
            assigned: None,
            locations: SmallVec::new(),
            fixed: SmallVec::new(),
            succs: [None, None],
            preds: SmallVec::new(),
            next_local: None,
        }
    }

    #[inline]
    pub fn first_loc(&self) -> Option<Location> {
        self.locations.first().copied()
    }

    #[inline]
    pub fn last_loc(&self) -> Option<Location> {
        self.locations.last().copied()
    }

    #[inline]
    pub fn has_locations(&self) -> bool {
        !self.locations.is_empty()
    }

    #[inline]
    pub fn has_forward_links(&self) -> bool {
        self.succs.iter().any(|s| s.is_some())
    }

    /// Whether instruction `index` falls inside the interval.
    #[inline]
    pub fn covers(&self, index: u32) -> bool {
        self.start.index() <= index && index <= self.end.index()
    }

    /// Record a use at `index`. Uses arrive in ascending instruction order
    /// from the producer; a read and a write at the same index coalesce
    /// into one entry.
    pub fn record_use(&mut self, index: u32, is_read: bool, is_write: bool) {
        assert!(self.covers(index), "use at {index} outside fragment interval");
        if let Some(last) = self.locations.last_mut() {
            assert!(last.index <= index, "uses must be recorded in order");
            if last.index == index {
                last.is_read |= is_read;
                last.is_write |= is_write;
                return;
            }
        }
        self.locations.push(Location {
            index,
            is_read,
            is_write,
        });
    }

    /// Record a fixed-register requirement at `pos`. Requirements arrive in
    /// ascending position order from the producer.
    pub fn add_fixed(&mut self, pos: Pos, allowed: PhysRegSet) {
        assert!(!allowed.is_empty(), "fixed requirement with empty register set");
        if let Some(last) = self.fixed.last() {
            assert!(last.pos <= pos, "fixed requirements must be recorded in order");
        }
        self.fixed.push(FixedReq { pos, allowed });
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "%v{} [{}..{}] seg.{}",
            self.vreg.0, self.start, self.end, self.segment.0
        )?;
        match self.assigned {
            Some(reg) => write!(f, " -> {reg}"),
            None => write!(f, " -> _"),
        }
    }
}

#[cfg(test)]
#[path = "tests/t_fragment.rs"]
mod tests;
