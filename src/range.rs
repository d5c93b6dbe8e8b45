//! Numeric ranges are indexed as sets of aligned partitions.
//!
//! Values are mapped onto `u64` so that ordering is preserved, then the domain is
//! split into blocks of `arity^level` values aligned on their own size. A range
//! leaf posts under the few blocks that exactly tile it, and a query value asks
//! for the one block containing it at each level. The value is inside the range
//! iff one of those blocks is part of the tiling.
use crate::terms::Term;

const SIGN_BIT: u64 = 1 << 63;
const DOMAIN_SIZE: u128 = 1 << 64;

#[inline]
fn to_ordered(value: i64) -> u64 {
    (value as u64) ^ SIGN_BIT
}

#[inline]
fn from_ordered(value: u64) -> i64 {
    (value ^ SIGN_BIT) as i64
}

/// An aligned block of the value domain, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Partition {
    pub from: i64,
    pub to: i64,
}

impl Partition {
    fn new(start: u128, size: u128) -> Self {
        Self {
            from: from_ordered(start as u64),
            to: from_ordered((start + size - 1) as u64),
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        self.from <= value && value <= self.to
    }

    pub fn term(&self, feature: &str) -> Term {
        Term::partition(feature, self.from, self.to)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RangeEncoder {
    arity: u128,
}

impl RangeEncoder {
    /// `arity` must be at least 2; [`crate::Config`] enforces it.
    pub fn new(arity: u16) -> Self {
        debug_assert!(arity >= 2);
        Self {
            arity: u128::from(arity),
        }
    }

    /// The maximal aligned blocks that exactly tile `[from, to]`, in ascending order.
    pub fn partitions(&self, from: i64, to: i64) -> Vec<Partition> {
        let mut partitions = vec![];
        let mut start = u128::from(to_ordered(from));
        let end = u128::from(to_ordered(to)) + 1;
        while start < end {
            let mut size = 1;
            loop {
                let next = size * self.arity;
                if next > DOMAIN_SIZE || start % next != 0 || start + next > end {
                    break;
                }
                size = next;
            }
            partitions.push(Partition::new(start, size));
            start += size;
        }
        partitions
    }

    /// The block containing `value` at every level, smallest first.
    ///
    /// Stops at the first level whose block runs past the end of the domain;
    /// such blocks, and the larger ones enclosing them, never tile a range.
    pub fn enclosing(&self, value: i64) -> Vec<Partition> {
        let ordered = u128::from(to_ordered(value));
        let mut partitions = vec![];
        let mut size = 1;
        while size <= DOMAIN_SIZE {
            let start = ordered - ordered % size;
            if start + size > DOMAIN_SIZE {
                break;
            }
            partitions.push(Partition::new(start, size));
            size *= self.arity;
        }
        partitions
    }
}
