use crate::DocumentId;
use std::fmt::{self, Display};

/// `[begin, end]`, both inclusive and 1-based.
///
/// An interval connects boundary `begin - 1` to boundary `end` of a document's
/// compiled predicate; boundary `0` is the start and the document's terminal is
/// the last one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    pub begin: u32,
    pub end: u32,
}

impl Interval {
    pub fn new(begin: u32, end: u32) -> Self {
        Self { begin, end }
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.begin, self.end)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Posting {
    pub doc_id: DocumentId,
    pub interval: Interval,
    /// Zero for postings that satisfy `interval`. Otherwise the document-local
    /// slot of the negated leaf that a hit on this posting rules out.
    pub exclusion: u32,
}

impl Posting {
    #[inline]
    pub fn is_exclusion(&self) -> bool {
        self.exclusion != 0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostingList(Vec<Posting>);

impl PostingList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, posting: Posting) {
        self.0.push(posting);
    }

    /// Stable, so postings of one document keep their compilation order.
    pub fn sort(&mut self) {
        self.0.sort_by_key(|posting| posting.doc_id);
    }

    pub fn is_sorted(&self) -> bool {
        self.0.windows(2).all(|w| w[0].doc_id <= w[1].doc_id)
    }

    pub fn as_slice(&self) -> &[Posting] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<Posting> for PostingList {
    fn from_iter<I: IntoIterator<Item = Posting>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
