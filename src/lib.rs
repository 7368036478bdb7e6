//! Live-range fragment model for a JIT register allocator.
//!
//! The instruction-selection stage hands us a graph of [`Segment`]s (basic
//! blocks) populated with [`Fragment`]s, one per virtual register per block
//! it is live in, linked across block boundaries wherever liveness
//! continues. The allocation driver then reshapes the fragments with
//! [`LiveGraph::merge`], [`LiveGraph::split`] and [`LiveGraph::explode`],
//! guided by the estimators in [`cost`], until every connected component
//! ("cluster") has a feasible physical-register assignment. The settled
//! fragments are what the code emitter reads back via
//! [`LiveGraph::assignment_at`].

pub mod cost;
pub mod fragment;
pub mod graph;
pub mod mutate;
pub mod pos;
pub mod segment;
pub mod store;
pub mod verify;

pub use fragment::{FixedReq, FragId, Fragment, Location, PhysReg, PhysRegSet, RegClass, VregId};
pub use graph::{GraphDisplay, LiveGraph};
pub use pos::{Pos, Side};
pub use segment::{Branch, Segment, SegmentId};
pub use verify::{VerifyError, verify_graph};
