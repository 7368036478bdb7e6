//! Structural validation of the live-range graph.
//!
//! A failing check means the producer or the driver broke a contract; the
//! mutation paths run the per-fragment checks on their operands in debug
//! builds and panic on violation.

use thiserror::Error;

use crate::fragment::{FragId, Fragment};
use crate::graph::LiveGraph;
use crate::segment::Branch;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("fragment {0}: interval start {1} after end {2}")]
    InvertedInterval(u32, String, String),

    #[error("fragment {0}: interval extends past the segment exit edge")]
    IntervalPastSegment(u32),

    #[error("fragment {0}: location list not strictly sorted at index {1}")]
    UnsortedLocations(u32, u32),

    #[error("fragment {0}: location at {1} outside the interval")]
    LocationOutsideInterval(u32, u32),

    #[error("fragment {0}: location at {1} is neither read nor write")]
    EmptyLocation(u32, u32),

    #[error("fragment {0}: fixed requirements out of position order")]
    UnsortedFixedReqs(u32),

    #[error("fragment {0}: fixed requirement at {1} outside the interval")]
    FixedReqOutsideInterval(u32, String),

    #[error("fragment {0}: fixed requirement at {1} has an empty register set")]
    EmptyFixedReqSet(u32, String),

    #[error("fragment {0}: forward link into segment {1} but block edge leads to {2:?}")]
    LinkWrongSegment(u32, u32, Option<u32>),

    #[error("fragment {0}: forward link to {1} without a matching backward link")]
    UnpairedForwardLink(u32, u32),

    #[error("fragment {0}: backward link from {1} without a matching forward link")]
    UnpairedBackwardLink(u32, u32),

    #[error("fragment {0}: linked to {1} which has a different vreg")]
    LinkVregMismatch(u32, u32),

    #[error("fragment {0}: has a forward link but does not end on the exit edge")]
    ForwardLinkNotAtExit(u32),

    #[error("fragment {0}: has a backward link but does not start on the entry edge")]
    BackwardLinkNotAtEntry(u32),

    #[error("fragment {0}: missing from its segment's fragment list")]
    NotInSegmentList(u32),

    #[error("fragment {0}: unreachable from its segment's vreg chain")]
    NotInVregChain(u32),
}

/// Validate one fragment: interval ordering, location and fixed-requirement
/// discipline, link pairing, boundary touching, and index membership.
pub fn verify_fragment(graph: &LiveGraph, id: FragId) -> Result<(), VerifyError> {
    let frag = graph.fragment(id);
    let seg = graph.segment(frag.segment);

    if frag.start > frag.end {
        return Err(VerifyError::InvertedInterval(
            id.0,
            frag.start.to_string(),
            frag.end.to_string(),
        ));
    }
    if frag.end > seg.exit_pos() {
        return Err(VerifyError::IntervalPastSegment(id.0));
    }

    let mut prev = None;
    for loc in &frag.locations {
        if let Some(p) = prev
            && p >= loc.index
        {
            return Err(VerifyError::UnsortedLocations(id.0, loc.index));
        }
        prev = Some(loc.index);
        if !frag.covers(loc.index) {
            return Err(VerifyError::LocationOutsideInterval(id.0, loc.index));
        }
        if !loc.is_read && !loc.is_write {
            return Err(VerifyError::EmptyLocation(id.0, loc.index));
        }
    }

    let mut prev = None;
    for req in &frag.fixed {
        if let Some(p) = prev
            && p > req.pos
        {
            return Err(VerifyError::UnsortedFixedReqs(id.0));
        }
        prev = Some(req.pos);
        if !frag.covers(req.pos.index()) {
            return Err(VerifyError::FixedReqOutsideInterval(id.0, req.pos.to_string()));
        }
        if req.allowed.is_empty() {
            return Err(VerifyError::EmptyFixedReqSet(id.0, req.pos.to_string()));
        }
    }

    for branch in Branch::ALL {
        let Some(succ) = frag.succs[branch.index()] else {
            continue;
        };
        let target: &Fragment = graph.fragment(succ);
        let edge = seg.succ(branch);
        if edge != Some(target.segment) {
            return Err(VerifyError::LinkWrongSegment(
                id.0,
                target.segment.0,
                edge.map(|s| s.0),
            ));
        }
        if !target.preds.contains(&id) {
            return Err(VerifyError::UnpairedForwardLink(id.0, succ.0));
        }
        if target.vreg != frag.vreg {
            return Err(VerifyError::LinkVregMismatch(id.0, succ.0));
        }
        if frag.end != seg.exit_pos() {
            return Err(VerifyError::ForwardLinkNotAtExit(id.0));
        }
    }

    for &pred in &frag.preds {
        let source = graph.fragment(pred);
        if !source.succs.contains(&Some(id)) {
            return Err(VerifyError::UnpairedBackwardLink(id.0, pred.0));
        }
        if source.vreg != frag.vreg {
            return Err(VerifyError::LinkVregMismatch(id.0, pred.0));
        }
        if frag.start != seg.entry_pos() {
            return Err(VerifyError::BackwardLinkNotAtEntry(id.0));
        }
    }

    if !seg.fragments().contains(&id) {
        return Err(VerifyError::NotInSegmentList(id.0));
    }
    let mut cur = seg.vreg_head(frag.vreg);
    let mut found = false;
    let mut steps = 0usize;
    while let Some(c) = cur {
        if c == id {
            found = true;
            break;
        }
        steps += 1;
        if steps > seg.fragments().len() {
            break; // Cycle in the chain; reported as unreachable.
        }
        cur = graph.fragment(c).next_local;
    }
    if !found {
        return Err(VerifyError::NotInVregChain(id.0));
    }

    Ok(())
}

/// Validate every live fragment in the graph.
pub fn verify_graph(graph: &LiveGraph) -> Result<(), VerifyError> {
    for (id, _) in graph.fragments() {
        verify_fragment(graph, id)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/t_verify.rs"]
mod tests;
