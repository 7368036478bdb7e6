use std::fmt;

/// Which edge of an instruction a position refers to.
///
/// Splitting between a read and a write on the same instruction needs
/// positions finer than a bare instruction index, so every position carries
/// an edge side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Before,
    After,
}

/// A program point inside one segment: (instruction index, edge side).
///
/// Packed so that positions order and step cheaply: `before(i)` sorts
/// immediately ahead of `after(i)`, and `after(i)` immediately ahead of
/// `before(i + 1)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos(u32);

impl Pos {
    #[inline]
    pub fn before(index: u32) -> Self {
        Pos(index << 1)
    }

    #[inline]
    pub fn after(index: u32) -> Self {
        Pos(index << 1 | 1)
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.0 >> 1
    }

    #[inline]
    pub fn side(self) -> Side {
        if self.0 & 1 == 0 { Side::Before } else { Side::After }
    }

    /// The edge one step earlier in the segment.
    #[inline]
    pub fn prev(self) -> Self {
        debug_assert!(self.0 > 0, "no position before the segment entry edge");
        Pos(self.0 - 1)
    }

    /// The edge one step later in the segment.
    #[inline]
    pub fn next(self) -> Self {
        Pos(self.0 + 1)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side() {
            Side::Before => 'b',
            Side::After => 'a',
        };
        write!(f, "{}{}", self.index(), side)
    }
}

impl fmt::Debug for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({self})")
    }
}

#[cfg(test)]
#[path = "tests/t_pos.rs"]
mod tests;
