//! An index of boolean predicates, one per document, answering the question
//! "which documents accept this set of feature values?".
//!
//! Every predicate is compiled into interval-labelled postings: leaves post
//! under their `(feature, value)` terms and numeric ranges post under a few
//! aligned partitions. A search merges the posting lists the query selects
//! and checks, per document, that the hit intervals connect the start of the
//! predicate to its end.
//!
//! # Examples
//!
//! Indexing targeting rules and finding the ones that accept a request:
//!
//! ```
//! use predicate_index::{Predicate, PredicateIndexBuilder, PredicateQuery};
//!
//! let mut builder = PredicateIndexBuilder::new(8).unwrap();
//! builder
//!     .index_document(
//!         1,
//!         &Predicate::and([
//!             Predicate::feature_set("country", ["no", "se"]),
//!             Predicate::feature_not_in("segment", [13, 14]),
//!         ]),
//!     )
//!     .unwrap();
//! builder
//!     .index_document(2, &Predicate::feature_range("age", Some(20), Some(40)))
//!     .unwrap();
//! builder.index_document(3, &Predicate::True).unwrap();
//! let index = builder.build();
//!
//! let mut query = PredicateQuery::new();
//! query
//!     .add_feature("country", "no")
//!     .add_feature("segment", 2)
//!     .add_range_feature("age", 36);
//!
//! let matches: Vec<_> = index.searcher().search(&query).doc_ids().collect();
//! assert_eq!(matches, vec![1, 2, 3]);
//! ```
//!
//! # Sub-queries
//!
//! Every query assignment carries a 64-bit bitmap. Bit `k` set means the
//! assignment belongs to sub-query `k`; a [`Hit`] reports the sub-queries the
//! document matched, so up to 64 related queries can share one search:
//!
//! ```
//! use predicate_index::{Predicate, PredicateIndexBuilder, PredicateQuery, ALL_SUBQUERIES};
//!
//! let mut builder = PredicateIndexBuilder::new(8).unwrap();
//! builder
//!     .index_document(
//!         1,
//!         &Predicate::and([
//!             Predicate::feature_set("country", ["no"]),
//!             Predicate::feature_set("gender", ["male"]),
//!         ]),
//!     )
//!     .unwrap();
//! let index = builder.build();
//!
//! let mut query = PredicateQuery::new();
//! query
//!     .add_feature_with_subqueries("country", "no", ALL_SUBQUERIES)
//!     .add_feature_with_subqueries("gender", "male", 0b01)
//!     .add_feature_with_subqueries("gender", "female", 0b10);
//!
//! let hits: Vec<_> = index.searcher().search(&query).collect();
//! assert_eq!(hits.len(), 1);
//! assert!(hits[0].matches_subquery(0));
//! assert!(!hits[0].matches_subquery(1));
//! ```
//!
//! # Persistence
//!
//! An index can be written to any [`std::io::Write`] and read back from any
//! [`std::io::Read`]; see [`PredicateIndex::write_to`] and
//! [`PredicateIndex::read_from`]. The stream is versioned and checksummed.
mod builder;
mod compiler;
mod config;
mod error;
mod format;
mod index;
mod posting;
mod predicate;
mod query;
mod range;
mod search;
mod terms;

#[cfg(test)]
mod test_utils;

pub type DocumentId = u32;

pub use crate::builder::PredicateIndexBuilder;
pub use crate::config::Config;
pub use crate::error::{InvalidPredicateError, PredicateIndexError, SerializationFormatError};
pub use crate::format::{MAGIC, VERSION};
pub use crate::index::{DocumentInfo, PredicateIndex};
pub use crate::posting::{Interval, Posting};
pub use crate::predicate::{Predicate, Value};
pub use crate::query::{FeatureAssignment, PredicateQuery, RangeAssignment, ALL_SUBQUERIES};
pub use crate::range::{Partition, RangeEncoder};
pub use crate::search::{Hit, Hits, Searcher};
pub use crate::terms::Term;
