use itertools::Itertools;
use std::fmt::{self, Display};

/// An atom that can be assigned to a feature, either in a predicate or in a query.
#[derive(Hash, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    String(String),
    Integer(i64),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => write!(f, "'{value}'"),
            Self::Integer(value) => write!(f, "{value}"),
        }
    }
}

/// A boolean expression over feature conditions, attached to one document.
///
/// `Not` may wrap any sub-tree; negations are pushed down to the leaves when
/// the predicate is compiled.
#[derive(Hash, Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    FeatureSet {
        feature: String,
        values: Vec<Value>,
    },
    /// Inclusive on both ends; a missing bound leaves that side open.
    FeatureRange {
        feature: String,
        from: Option<i64>,
        to: Option<i64>,
    },
    True,
    False,
}

impl Predicate {
    pub fn and(children: impl IntoIterator<Item = Predicate>) -> Self {
        Self::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = Predicate>) -> Self {
        Self::Or(children.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Predicate) -> Self {
        Self::Not(Box::new(child))
    }

    pub fn feature_set<V: Into<Value>>(
        feature: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::FeatureSet {
            feature: feature.to_owned(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Shorthand for `not(feature_set(..))`.
    pub fn feature_not_in<V: Into<Value>>(
        feature: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::not(Self::feature_set(feature, values))
    }

    pub fn feature_range(feature: &str, from: Option<i64>, to: Option<i64>) -> Self {
        Self::FeatureRange {
            feature: feature.to_owned(),
            from,
            to,
        }
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(children) => write!(f, "({})", children.iter().join(" and ")),
            Self::Or(children) => write!(f, "({})", children.iter().join(" or ")),
            Self::Not(child) => match child.as_ref() {
                Self::FeatureSet { feature, values } => {
                    write!(f, "{feature} not in [{}]", values.iter().join(", "))
                }
                child => write!(f, "not {child}"),
            },
            Self::FeatureSet { feature, values } => {
                write!(f, "{feature} in [{}]", values.iter().join(", "))
            }
            Self::FeatureRange { feature, from, to } => {
                let from = from.map(|from| from.to_string()).unwrap_or_default();
                let to = to.map(|to| to.to_string()).unwrap_or_default();
                write!(f, "{feature} in [{from}..{to}]")
            }
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
        }
    }
}
