use crate::{
    config::Config,
    error::SerializationFormatError,
    format,
    posting::PostingList,
    search::Searcher,
    terms::TermTable,
    DocumentId,
};
use std::{
    collections::HashMap,
    io::{Read, Write},
};

/// What the searcher needs to know about a document beyond its postings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    /// Last boundary of the document's compiled predicate.
    pub terminal: u32,
    /// Fewest positive postings a query has to hit for the document to match.
    pub min_feature: u32,
    /// Number of negated leaves.
    pub slots: u32,
}

/// An immutable index of predicates, created by
/// [`crate::PredicateIndexBuilder::build`] or read back with
/// [`PredicateIndex::read_from`].
///
/// The index is never mutated after construction and can be shared freely
/// between threads; every search borrows it through a [`Searcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateIndex {
    pub(crate) config: Config,
    pub(crate) document_count: u64,
    pub(crate) terms: TermTable,
    /// Indexed by term id.
    pub(crate) postings: Vec<PostingList>,
    /// Negated leaves, folded into every search.
    pub(crate) defaults: PostingList,
    /// Ascending.
    pub(crate) zero_constraint: Vec<DocumentId>,
    pub(crate) documents: HashMap<DocumentId, DocumentInfo>,
}

impl PredicateIndex {
    pub fn searcher(&self) -> Searcher<'_> {
        Searcher::new(self)
    }

    pub fn config(&self) -> Config {
        self.config
    }

    pub fn arity(&self) -> u16 {
        self.config.arity()
    }

    /// Every indexed id, including those whose predicate can never match.
    pub fn document_count(&self) -> u64 {
        self.document_count
    }

    /// `None` for zero-constraint documents and for those that can never match.
    pub fn document(&self, id: DocumentId) -> Option<DocumentInfo> {
        self.documents.get(&id).copied()
    }

    pub fn zero_constraint_documents(&self) -> &[DocumentId] {
        &self.zero_constraint
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn posting_count(&self) -> usize {
        self.postings.iter().map(PostingList::len).sum::<usize>() + self.defaults.len()
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), SerializationFormatError> {
        format::write(self, writer)
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Self, SerializationFormatError> {
        format::read(reader)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationFormatError> {
        format::decode(bytes)
    }
}
