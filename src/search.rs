use crate::{
    index::PredicateIndex,
    posting::{Interval, Posting},
    query::{PredicateQuery, ALL_SUBQUERIES},
    range::RangeEncoder,
    terms::{Term, TermId},
    DocumentId,
};
use itertools::{structs::KMergeBy, Itertools};
use std::{
    collections::HashMap,
    fmt::{self, Display},
    iter::Peekable,
    slice,
};
use tracing::trace;

/// A matching document along with the sub-queries it matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Hit {
    doc_id: DocumentId,
    subqueries: u64,
}

impl Hit {
    pub fn new(doc_id: DocumentId, subqueries: u64) -> Self {
        Self { doc_id, subqueries }
    }

    pub fn doc_id(&self) -> DocumentId {
        self.doc_id
    }

    pub fn subqueries(&self) -> u64 {
        self.subqueries
    }

    pub fn matches_subquery(&self, subquery: u32) -> bool {
        subquery < u64::BITS && self.subqueries & (1u64 << subquery) != 0
    }
}

impl Display for Hit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{:#x}]", self.doc_id, self.subqueries)
    }
}

/// Evaluates queries against one index. Cheap to create and to copy.
#[derive(Clone, Copy, Debug)]
pub struct Searcher<'a> {
    index: &'a PredicateIndex,
}

impl<'a> Searcher<'a> {
    pub(crate) fn new(index: &'a PredicateIndex) -> Self {
        Self { index }
    }

    /// Returns the matching documents in ascending id order.
    ///
    /// Nothing is evaluated until the returned iterator is advanced, and every
    /// call to `next` only merges postings up to the next match, so dropping
    /// the iterator early skips the rest of the work.
    pub fn search(&self, query: &PredicateQuery) -> Hits<'a> {
        let terms = self.resolve(query);
        trace!(
            features = query.features().len(),
            range_features = query.range_features().len(),
            posting_lists = terms.len(),
            "searching predicate index"
        );

        let mut cursors = Vec::with_capacity(terms.len() + 2);
        cursors.push(Cursor::Unconstrained(self.index.zero_constraint.iter()));
        cursors.push(Cursor::Defaults(self.index.defaults.as_slice().iter()));
        cursors.extend(terms.into_iter().map(|(id, subqueries)| Cursor::Matched {
            postings: self.index.postings[id.index()].as_slice().iter(),
            subqueries,
        }));

        Hits {
            index: self.index,
            entries: cursors
                .into_iter()
                .kmerge_by(by_document as ByDocument)
                .peekable(),
            document: vec![],
            edges: vec![],
            exclusions: vec![],
            reached: vec![],
        }
    }

    /// Maps the query onto the posting lists it selects. Assignments of the
    /// same term are merged by OR-ing their sub-queries.
    fn resolve(&self, query: &PredicateQuery) -> HashMap<TermId, u64> {
        let mut selected: HashMap<TermId, u64> = HashMap::new();
        let mut select = |term: &Term, subqueries: u64| {
            if subqueries == 0 {
                return;
            }
            if let Some(id) = self.index.terms.get(term) {
                *selected.entry(id).or_default() |= subqueries;
            }
        };

        for assignment in query.features() {
            let term = Term::value(&assignment.feature, assignment.value.clone());
            select(&term, assignment.subqueries);
        }
        let ranges = RangeEncoder::new(self.index.arity());
        for assignment in query.range_features() {
            for partition in ranges.enclosing(assignment.value) {
                select(&partition.term(&assignment.feature), assignment.subqueries);
            }
        }
        selected
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryKind {
    /// The document matches whatever the query holds.
    Unconstrained,
    Satisfied,
    /// The query holds a value a negated leaf rules out.
    Excluded,
    /// A negated leaf, satisfied unless excluded.
    Default,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    doc_id: DocumentId,
    interval: Interval,
    slot: u32,
    subqueries: u64,
    kind: EntryKind,
}

enum Cursor<'a> {
    Unconstrained(slice::Iter<'a, DocumentId>),
    Defaults(slice::Iter<'a, Posting>),
    Matched {
        postings: slice::Iter<'a, Posting>,
        subqueries: u64,
    },
}

impl Iterator for Cursor<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Unconstrained(ids) => ids.next().map(|&doc_id| Entry {
                doc_id,
                interval: Interval::default(),
                slot: 0,
                subqueries: ALL_SUBQUERIES,
                kind: EntryKind::Unconstrained,
            }),
            Self::Defaults(postings) => postings.next().map(|posting| Entry {
                doc_id: posting.doc_id,
                interval: posting.interval,
                slot: posting.exclusion,
                subqueries: ALL_SUBQUERIES,
                kind: EntryKind::Default,
            }),
            Self::Matched {
                postings,
                subqueries,
            } => {
                let subqueries = *subqueries;
                postings.next().map(|posting| Entry {
                    doc_id: posting.doc_id,
                    interval: posting.interval,
                    slot: posting.exclusion,
                    subqueries,
                    kind: if posting.is_exclusion() {
                        EntryKind::Excluded
                    } else {
                        EntryKind::Satisfied
                    },
                })
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Unconstrained(ids) => ids.size_hint(),
            Self::Defaults(postings) | Self::Matched { postings, .. } => postings.size_hint(),
        }
    }
}

type ByDocument = fn(&Entry, &Entry) -> bool;

fn by_document(a: &Entry, b: &Entry) -> bool {
    a.doc_id < b.doc_id
}

/// Lazy, single-pass sequence of [`Hit`]s in ascending document order.
pub struct Hits<'a> {
    index: &'a PredicateIndex,
    entries: Peekable<KMergeBy<Cursor<'a>, ByDocument>>,
    // Scratch space reused from one document to the next.
    document: Vec<Entry>,
    edges: Vec<(Interval, u64)>,
    exclusions: Vec<u64>,
    reached: Vec<u64>,
}

impl<'a> Hits<'a> {
    /// Drops the sub-query bitmaps.
    pub fn doc_ids(self) -> impl Iterator<Item = DocumentId> + 'a {
        self.map(|hit| hit.doc_id)
    }

    /// Returns the sub-queries `doc_id` matches, if any.
    fn evaluate(&mut self, doc_id: DocumentId) -> Option<u64> {
        if self
            .document
            .iter()
            .any(|entry| entry.kind == EntryKind::Unconstrained)
        {
            return Some(ALL_SUBQUERIES);
        }

        let info = *self.index.documents.get(&doc_id)?;
        let satisfied = self
            .document
            .iter()
            .filter(|entry| entry.kind == EntryKind::Satisfied)
            .count();
        if satisfied < info.min_feature as usize {
            return None;
        }

        self.exclusions.clear();
        self.exclusions.resize(info.slots as usize + 1, 0);
        for entry in &self.document {
            if entry.kind == EntryKind::Excluded {
                if let Some(excluded) = self.exclusions.get_mut(entry.slot as usize) {
                    *excluded |= entry.subqueries;
                }
            }
        }

        self.edges.clear();
        for entry in &self.document {
            let subqueries = match entry.kind {
                EntryKind::Satisfied => entry.subqueries,
                EntryKind::Default => {
                    !self.exclusions.get(entry.slot as usize).copied().unwrap_or(0)
                }
                EntryKind::Excluded | EntryKind::Unconstrained => continue,
            };
            if subqueries != 0 {
                self.edges.push((entry.interval, subqueries));
            }
        }
        self.edges.sort_unstable_by_key(|(interval, _)| interval.begin);

        // Boundaries are numbered so that every interval ends above where it
        // begins; in `begin` order, `reached[begin - 1]` is final when read.
        let terminal = info.terminal as usize;
        self.reached.clear();
        self.reached.resize(terminal + 1, 0);
        self.reached[0] = ALL_SUBQUERIES;
        for &(interval, subqueries) in &self.edges {
            let from = self.reached[interval.begin as usize - 1];
            self.reached[interval.end as usize] |= from & subqueries;
        }

        let subqueries = self.reached[terminal];
        (subqueries != 0).then_some(subqueries)
    }
}

impl Iterator for Hits<'_> {
    type Item = Hit;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(first) = self.entries.next() {
            self.document.clear();
            self.document.push(first);
            while let Some(entry) = self
                .entries
                .next_if(|entry| entry.doc_id == first.doc_id)
            {
                self.document.push(entry);
            }
            if let Some(subqueries) = self.evaluate(first.doc_id) {
                return Some(Hit::new(first.doc_id, subqueries));
            }
        }
        None
    }
}
