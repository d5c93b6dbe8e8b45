//! Binary serialization of a [`PredicateIndex`].
//!
//! ```text
//! magic      [u8; 4] = "PRDX"
//! version    u32
//! arity      u16
//! doc_count  u64
//! zero       u32 n, n x doc u32                  ascending
//! documents  u32 n, n x (doc, terminal, min_feature, slots) u32
//! wildcard   list
//! terms      u32 n, n x (term, list)
//! checksum   u32                                 crc32 of every preceding byte
//!
//! term       tag u8, feature (u32 len, utf8), then
//!            0: u32 len, utf8 | 1: i64 | 2: i64 from, i64 to
//! list       u32 n, n x (doc, begin, end, exclusion) u32
//! ```
//!
//! All integers are little-endian. Sub-query bitmaps belong to queries and are
//! never stored.
use crate::{
    config::Config,
    error::SerializationFormatError,
    index::{DocumentInfo, PredicateIndex},
    posting::{Interval, Posting, PostingList},
    predicate::Value,
    terms::{Term, TermTable},
    DocumentId,
};
use std::{
    collections::HashMap,
    io::{Read, Write},
};
use tracing::info;

pub const MAGIC: [u8; 4] = *b"PRDX";
pub const VERSION: u32 = 1;

const STRING_VALUE: u8 = 0;
const INTEGER_VALUE: u8 = 1;
const PARTITION: u8 = 2;

const POSTING_SIZE: usize = 16;
const DOCUMENT_SIZE: usize = 16;

pub fn write<W: Write>(
    index: &PredicateIndex,
    mut writer: W,
) -> Result<(), SerializationFormatError> {
    let bytes = encode(index);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

pub fn read<R: Read>(mut reader: R) -> Result<PredicateIndex, SerializationFormatError> {
    let mut bytes = vec![];
    reader.read_to_end(&mut bytes)?;
    decode(&bytes)
}

pub fn encode(index: &PredicateIndex) -> Vec<u8> {
    let mut encoder = Encoder::default();
    encoder.bytes(&MAGIC);
    encoder.u32(VERSION);
    encoder.u16(index.config.arity());
    encoder.u64(index.document_count);

    encoder.len(index.zero_constraint.len());
    for &id in &index.zero_constraint {
        encoder.u32(id);
    }

    let mut documents: Vec<_> = index.documents.iter().collect();
    documents.sort_unstable_by_key(|(id, _)| **id);
    encoder.len(documents.len());
    for (&id, info) in documents {
        encoder.u32(id);
        encoder.u32(info.terminal);
        encoder.u32(info.min_feature);
        encoder.u32(info.slots);
    }

    encoder.list(&index.defaults);
    encoder.len(index.terms.len());
    for ((_, term), list) in index.terms.iter().zip(&index.postings) {
        encoder.term(term);
        encoder.list(list);
    }

    let checksum = crc32fast::hash(&encoder.buffer);
    encoder.u32(checksum);

    info!(
        bytes = encoder.buffer.len(),
        documents = index.document_count,
        terms = index.terms.len(),
        "serialized predicate index"
    );
    encoder.buffer
}

pub fn decode(bytes: &[u8]) -> Result<PredicateIndex, SerializationFormatError> {
    let mut decoder = Decoder::new(bytes);
    if decoder.array::<4>()? != MAGIC {
        return Err(SerializationFormatError::BadMagic);
    }
    let version = decoder.u32()?;
    if version != VERSION {
        return Err(SerializationFormatError::UnsupportedVersion {
            found: version,
            expected: VERSION,
        });
    }
    let raw = RawIndex::decode(&mut decoder)?;

    let computed = crc32fast::hash(&bytes[..decoder.position]);
    let stored = decoder.u32()?;
    if stored != computed {
        return Err(SerializationFormatError::ChecksumMismatch { stored, computed });
    }
    if decoder.remaining() != 0 {
        return Err(corrupt(format!(
            "{} trailing bytes after the checksum",
            decoder.remaining()
        )));
    }

    let index = raw.validate()?;
    info!(
        bytes = bytes.len(),
        documents = index.document_count,
        terms = index.terms.len(),
        "deserialized predicate index"
    );
    Ok(index)
}

fn corrupt(message: impl Into<String>) -> SerializationFormatError {
    SerializationFormatError::Corrupt(message.into())
}

#[derive(Default)]
struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    fn bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.bytes(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.bytes(&value.to_le_bytes());
    }

    fn u64(&mut self, value: u64) {
        self.bytes(&value.to_le_bytes());
    }

    fn i64(&mut self, value: i64) {
        self.bytes(&value.to_le_bytes());
    }

    /// Collections are bounded by the `u32` document and term spaces.
    fn len(&mut self, len: usize) {
        self.u32(len as u32);
    }

    fn str(&mut self, value: &str) {
        self.len(value.len());
        self.bytes(value.as_bytes());
    }

    fn term(&mut self, term: &Term) {
        match term {
            Term::Value {
                feature,
                value: Value::String(value),
            } => {
                self.u8(STRING_VALUE);
                self.str(feature);
                self.str(value);
            }
            Term::Value {
                feature,
                value: Value::Integer(value),
            } => {
                self.u8(INTEGER_VALUE);
                self.str(feature);
                self.i64(*value);
            }
            Term::Partition { feature, from, to } => {
                self.u8(PARTITION);
                self.str(feature);
                self.i64(*from);
                self.i64(*to);
            }
        }
    }

    fn list(&mut self, list: &PostingList) {
        self.len(list.len());
        for posting in list.as_slice() {
            self.u32(posting.doc_id);
            self.u32(posting.interval.begin);
            self.u32(posting.interval.end);
            self.u32(posting.exclusion);
        }
    }
}

struct Decoder<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Decoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], SerializationFormatError> {
        if self.remaining() < len {
            return Err(SerializationFormatError::Truncated(self.bytes.len()));
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], SerializationFormatError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    fn u8(&mut self) -> Result<u8, SerializationFormatError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, SerializationFormatError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, SerializationFormatError> {
        self.array().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> Result<u64, SerializationFormatError> {
        self.array().map(u64::from_le_bytes)
    }

    fn i64(&mut self) -> Result<i64, SerializationFormatError> {
        self.array().map(i64::from_le_bytes)
    }

    /// Reads a count of records of `size` bytes each, failing early when the
    /// stream is too short to hold them.
    fn len(&mut self, size: usize) -> Result<usize, SerializationFormatError> {
        let len = self.u32()? as usize;
        if len.saturating_mul(size) > self.remaining() {
            return Err(SerializationFormatError::Truncated(self.bytes.len()));
        }
        Ok(len)
    }

    fn string(&mut self) -> Result<String, SerializationFormatError> {
        let len = self.len(1)?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| corrupt(format!("invalid utf-8: {e}")))
    }

    fn term(&mut self) -> Result<Term, SerializationFormatError> {
        let tag = self.u8()?;
        let feature = self.string()?;
        match tag {
            STRING_VALUE => Ok(Term::Value {
                feature,
                value: Value::String(self.string()?),
            }),
            INTEGER_VALUE => Ok(Term::Value {
                feature,
                value: Value::Integer(self.i64()?),
            }),
            PARTITION => Ok(Term::Partition {
                feature,
                from: self.i64()?,
                to: self.i64()?,
            }),
            tag => Err(corrupt(format!("unknown term tag {tag}"))),
        }
    }

    fn list(&mut self) -> Result<PostingList, SerializationFormatError> {
        let len = self.len(POSTING_SIZE)?;
        (0..len)
            .map(|_| -> Result<_, SerializationFormatError> {
                Ok(Posting {
                    doc_id: self.u32()?,
                    interval: Interval::new(self.u32()?, self.u32()?),
                    exclusion: self.u32()?,
                })
            })
            .collect()
    }
}

/// The decoded sections, before their invariants are checked.
struct RawIndex {
    arity: u16,
    document_count: u64,
    zero_constraint: Vec<DocumentId>,
    documents: Vec<(DocumentId, DocumentInfo)>,
    defaults: PostingList,
    terms: Vec<(Term, PostingList)>,
}

impl RawIndex {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, SerializationFormatError> {
        let arity = decoder.u16()?;
        let document_count = decoder.u64()?;

        let len = decoder.len(4)?;
        let zero_constraint = (0..len)
            .map(|_| decoder.u32())
            .collect::<Result<_, _>>()?;

        let len = decoder.len(DOCUMENT_SIZE)?;
        let documents = (0..len)
            .map(|_| -> Result<_, SerializationFormatError> {
                Ok((
                    decoder.u32()?,
                    DocumentInfo {
                        terminal: decoder.u32()?,
                        min_feature: decoder.u32()?,
                        slots: decoder.u32()?,
                    },
                ))
            })
            .collect::<Result<_, _>>()?;

        let defaults = decoder.list()?;
        let len = decoder.len(1)?;
        let terms = (0..len)
            .map(|_| -> Result<_, SerializationFormatError> {
                Ok((decoder.term()?, decoder.list()?))
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            arity,
            document_count,
            zero_constraint,
            documents,
            defaults,
            terms,
        })
    }

    fn validate(self) -> Result<PredicateIndex, SerializationFormatError> {
        let config = Config::new(self.arity).map_err(|e| corrupt(e.to_string()))?;

        if !self.zero_constraint.windows(2).all(|w| w[0] < w[1]) {
            return Err(corrupt("zero-constraint documents are not strictly ascending"));
        }
        let mut documents = HashMap::with_capacity(self.documents.len());
        for (id, info) in self.documents {
            if info.terminal == 0 {
                return Err(corrupt(format!("document {id} has no terminal")));
            }
            if documents.insert(id, info).is_some() {
                return Err(corrupt(format!("document {id} is described twice")));
            }
        }
        if let Some(id) = self
            .zero_constraint
            .iter()
            .find(|id| documents.contains_key(id))
        {
            return Err(corrupt(format!(
                "document {id} is both zero-constraint and constrained"
            )));
        }
        if self.document_count < (self.zero_constraint.len() + documents.len()) as u64 {
            return Err(corrupt(format!(
                "document count {} is below the number of described documents",
                self.document_count
            )));
        }

        validate_list(&self.defaults, &documents, "wildcard")?;
        if self.defaults.as_slice().iter().any(|p| !p.is_exclusion()) {
            return Err(corrupt("wildcard list holds a posting without a slot"));
        }

        let mut terms = TermTable::new();
        let mut postings = Vec::with_capacity(self.terms.len());
        for (term, list) in self.terms {
            validate_list(&list, &documents, &term.to_string())?;
            if terms.get(&term).is_some() {
                return Err(corrupt(format!("term {term} is stored twice")));
            }
            terms.get_or_update(term);
            postings.push(list);
        }
        validate_bounds(&documents, &self.defaults, &postings)?;

        Ok(PredicateIndex {
            config,
            document_count: self.document_count,
            terms,
            postings,
            defaults: self.defaults,
            zero_constraint: self.zero_constraint,
            documents,
        })
    }
}

/// Every leaf of a compiled predicate owns at least one posting and every
/// negated leaf owns one wildcard posting, so a document's terminal is at most
/// its posting count and its slots at most its wildcard postings. Searching
/// allocates by both.
fn validate_bounds(
    documents: &HashMap<DocumentId, DocumentInfo>,
    defaults: &PostingList,
    postings: &[PostingList],
) -> Result<(), SerializationFormatError> {
    let mut owned: HashMap<DocumentId, (u64, u64)> = HashMap::with_capacity(documents.len());
    for posting in defaults.as_slice() {
        let (all, wildcard) = owned.entry(posting.doc_id).or_default();
        *all += 1;
        *wildcard += 1;
    }
    for posting in postings.iter().flat_map(PostingList::as_slice) {
        owned.entry(posting.doc_id).or_default().0 += 1;
    }

    for (id, info) in documents {
        let (all, wildcard) = owned.get(id).copied().unwrap_or_default();
        if u64::from(info.terminal) > all {
            return Err(corrupt(format!(
                "document {id} has terminal {} but only {all} postings",
                info.terminal
            )));
        }
        if u64::from(info.slots) > wildcard {
            return Err(corrupt(format!(
                "document {id} has {} slots but only {wildcard} wildcard postings",
                info.slots
            )));
        }
    }
    Ok(())
}

fn validate_list(
    list: &PostingList,
    documents: &HashMap<DocumentId, DocumentInfo>,
    name: &str,
) -> Result<(), SerializationFormatError> {
    if !list.is_sorted() {
        return Err(corrupt(format!("posting list {name} is not sorted")));
    }
    for posting in list.as_slice() {
        let info = documents.get(&posting.doc_id).ok_or_else(|| {
            corrupt(format!(
                "posting list {name} refers to unknown document {}",
                posting.doc_id
            ))
        })?;
        let Interval { begin, end } = posting.interval;
        if begin == 0 || begin > end || end > info.terminal || posting.exclusion > info.slots {
            return Err(corrupt(format!(
                "posting list {name} holds {} out of bounds for document {}",
                posting.interval, posting.doc_id
            )));
        }
    }
    Ok(())
}
