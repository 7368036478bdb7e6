//! Fragment slot pool with free-list reuse.
//!
//! Allocator invocations are extremely allocation-heavy, so deleted
//! fragments return their slot to a free list instead of the global
//! allocator. Slots also carry the traversal epoch stamp so cluster walks
//! stay allocation-free.

use std::ops::{Index, IndexMut};

use crate::fragment::{FragId, Fragment};

#[derive(Debug)]
struct Slot {
    frag: Option<Fragment>,
    visited_epoch: u64,
}

/// Typed arena of fragments, addressed by [`FragId`]. Per-graph and
/// unsynchronized; concurrent compilations use independent pools.
#[derive(Debug, Default)]
pub struct FragmentPool {
    slots: Vec<Slot>,
    free: Vec<FragId>,
}

impl FragmentPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, frag: Fragment) -> FragId {
        match self.free.pop() {
            Some(id) => {
                let slot = &mut self.slots[id.index()];
                debug_assert!(slot.frag.is_none());
                slot.frag = Some(frag);
                id
            }
            None => {
                let id = FragId(self.slots.len() as u32);
                self.slots.push(Slot {
                    frag: Some(frag),
                    visited_epoch: 0,
                });
                id
            }
        }
    }

    /// Release `id` to the free list and return its fragment. The id must
    /// not be used afterwards.
    pub fn free(&mut self, id: FragId) -> Fragment {
        let slot = &mut self.slots[id.index()];
        let frag = slot.frag.take().expect("fragment freed twice");
        self.free.push(id);
        frag
    }

    /// Number of live fragments.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over live fragments.
    pub fn iter(&self) -> impl Iterator<Item = (FragId, &Fragment)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| Some((FragId(i as u32), slot.frag.as_ref()?)))
    }

    /// Stamp `id` with `epoch`; returns true on the first visit in this
    /// epoch.
    pub(crate) fn stamp(&mut self, id: FragId, epoch: u64) -> bool {
        let slot = &mut self.slots[id.index()];
        debug_assert!(slot.frag.is_some(), "traversal reached a freed fragment");
        if slot.visited_epoch == epoch {
            false
        } else {
            slot.visited_epoch = epoch;
            true
        }
    }
}

impl Index<FragId> for FragmentPool {
    type Output = Fragment;

    fn index(&self, id: FragId) -> &Fragment {
        self.slots[id.index()]
            .frag
            .as_ref()
            .expect("fragment used after delete")
    }
}

impl IndexMut<FragId> for FragmentPool {
    fn index_mut(&mut self, id: FragId) -> &mut Fragment {
        self.slots[id.index()]
            .frag
            .as_mut()
            .expect("fragment used after delete")
    }
}

#[cfg(test)]
#[path = "tests/t_store.rs"]
mod tests;
