use crate::predicate::Value;
use std::{
    collections::HashMap,
    fmt::{self, Display},
};

/// The key of a posting list.
///
/// Set-membership leaves post under `Value` terms, range leaves post under the
/// synthetic `Partition` terms produced by the range encoder, so the two never
/// collide even when they share a feature name.
#[derive(Hash, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Term {
    Value { feature: String, value: Value },
    Partition { feature: String, from: i64, to: i64 },
}

impl Term {
    pub fn value(feature: &str, value: Value) -> Self {
        Self::Value {
            feature: feature.to_owned(),
            value,
        }
    }

    pub fn partition(feature: &str, from: i64, to: i64) -> Self {
        Self::Partition {
            feature: feature.to_owned(),
            from,
            to,
        }
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value { feature, value } => write!(f, "{feature}={value}"),
            Self::Partition { feature, from, to } => write!(f, "{feature}=[{from}..{to}]"),
        }
    }
}

#[derive(Clone, Copy, Eq, Ord, PartialEq, PartialOrd, Hash, Debug)]
pub struct TermId(usize);

impl TermId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Interns terms so postings can be stored in a dense vector.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TermTable {
    by_terms: HashMap<Term, TermId>,
    terms: Vec<Term>,
}

impl TermTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, term: &Term) -> Option<TermId> {
        self.by_terms.get(term).copied()
    }

    pub fn get_or_update(&mut self, term: Term) -> TermId {
        if let Some(id) = self.by_terms.get(&term) {
            return *id;
        }
        let id = TermId(self.terms.len());
        self.terms.push(term.clone());
        self.by_terms.insert(term, id);
        id
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Terms in the order their ids were handed out.
    pub fn iter(&self) -> impl Iterator<Item = (TermId, &Term)> {
        self.terms
            .iter()
            .enumerate()
            .map(|(index, term)| (TermId(index), term))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_the_same_id_for_the_same_term() {
        let mut table = TermTable::new();

        let first = table.get_or_update(Term::value("country", Value::from("no")));
        let second = table.get_or_update(Term::value("country", Value::from("no")));

        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn can_distinguish_values_from_partitions() {
        let mut table = TermTable::new();

        let value = table.get_or_update(Term::value("age", Value::from(36)));
        let partition = table.get_or_update(Term::partition("age", 36, 36));

        assert_ne!(value, partition);
        assert_eq!(table.get(&Term::partition("age", 36, 36)), Some(partition));
    }

    #[test]
    fn return_none_for_unknown_terms() {
        let table = TermTable::new();

        assert_eq!(table.get(&Term::value("country", Value::from("se"))), None);
    }

    #[test]
    fn can_display_terms() {
        assert_eq!(Term::value("country", Value::from("no")).to_string(), "country='no'");
        assert_eq!(Term::partition("age", 20, 29).to_string(), "age=[20..29]");
    }
}
