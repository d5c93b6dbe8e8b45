use crate::DocumentId;
use std::io;
use thiserror::Error;

#[derive(Error, PartialEq, Debug)]
pub enum PredicateIndexError {
    #[error("document {0} has already been indexed")]
    DuplicateDocumentId(DocumentId),
    #[error("invalid predicate: {0}")]
    InvalidPredicate(#[from] InvalidPredicateError),
    #[error("arity must be at least 2, got {0}")]
    InvalidArity(u16),
}

#[derive(Error, PartialEq, Debug, Clone)]
pub enum InvalidPredicateError {
    #[error("feature '{0}' has an empty set of values")]
    EmptyValueSet(String),
    #[error("feature '{feature}' has an inverted range [{from}..{to}]")]
    InvertedRange { feature: String, from: i64, to: i64 },
    #[error("boolean operator without operands")]
    EmptyOperator,
    #[error(
        "predicate nests deeper than {depth} levels or needs more than {max} interval boundaries",
        depth = crate::compiler::IntervalCompiler::MAX_DEPTH,
        max = u32::MAX
    )]
    TooComplex,
}

#[derive(Error, Debug)]
pub enum SerializationFormatError {
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),
    #[error("stream does not start with the predicate index magic bytes")]
    BadMagic,
    #[error("unsupported format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("stream ended after {0} bytes")]
    Truncated(usize),
    #[error("checksum mismatch => stored: {stored:#010x}, computed: {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("corrupt index: {0}")]
    Corrupt(String),
}
