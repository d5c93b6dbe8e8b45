use crate::{query::ALL_SUBQUERIES, DocumentId, Predicate, PredicateQuery, Value};
use proptest::prelude::*;
use serde::Deserialize;

/// Sub-queries checked by the properties: the two that `arb_query` targets
/// separately and one only reachable through `ALL_SUBQUERIES`.
pub const SUBQUERIES: [u32; 3] = [0, 1, 63];

/// Reference semantics: evaluates `predicate` directly against the assignments
/// of `query` that belong to `subquery`.
pub fn evaluate(predicate: &Predicate, query: &PredicateQuery, subquery: u32) -> bool {
    let selected = |subqueries: u64| subqueries & (1u64 << subquery) != 0;
    match predicate {
        Predicate::And(children) => children
            .iter()
            .all(|child| evaluate(child, query, subquery)),
        Predicate::Or(children) => children
            .iter()
            .any(|child| evaluate(child, query, subquery)),
        Predicate::Not(child) => !evaluate(child, query, subquery),
        Predicate::FeatureSet { feature, values } => query.features().iter().any(|assignment| {
            selected(assignment.subqueries)
                && &assignment.feature == feature
                && values.contains(&assignment.value)
        }),
        Predicate::FeatureRange { feature, from, to } => {
            query.range_features().iter().any(|assignment| {
                selected(assignment.subqueries)
                    && &assignment.feature == feature
                    && from.map_or(true, |from| from <= assignment.value)
                    && to.map_or(true, |to| assignment.value <= to)
            })
        }
        Predicate::True => true,
        Predicate::False => false,
    }
}

const FEATURES: [&str; 3] = ["a", "b", "c"];
const VALUES: [&str; 3] = ["x", "y", "z"];
const RANGE_FEATURES: [&str; 2] = ["r", "s"];

fn arb_subqueries() -> impl Strategy<Value = u64> {
    prop_oneof![
        Just(ALL_SUBQUERIES),
        Just(0b01u64),
        Just(0b10u64),
        Just(0b11u64),
    ]
}

fn arb_leaf() -> impl Strategy<Value = Predicate> {
    let set = (
        prop::sample::select(FEATURES.to_vec()),
        prop::sample::subsequence(VALUES.to_vec(), 1..=VALUES.len()),
    )
        .prop_map(|(feature, values)| Predicate::feature_set(feature, values));
    let range = (
        prop::sample::select(RANGE_FEATURES.to_vec()),
        prop::option::weighted(0.8, -5i64..25),
        0i64..20,
        any::<bool>(),
    )
        .prop_map(|(feature, from, width, bounded)| {
            let to = match (from, bounded) {
                (Some(from), true) => Some(from + width),
                (None, true) => Some(width),
                (_, false) => None,
            };
            Predicate::feature_range(feature, from, to)
        });
    prop_oneof![
        6 => set,
        3 => range,
        1 => Just(Predicate::True),
        1 => Just(Predicate::False),
    ]
}

pub fn arb_predicate() -> impl Strategy<Value = Predicate> {
    arb_leaf().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Predicate::And),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Predicate::Or),
            inner.prop_map(Predicate::not),
        ]
    })
}

pub fn arb_query() -> impl Strategy<Value = PredicateQuery> {
    let features = prop::collection::vec(
        (
            prop::sample::select(FEATURES.to_vec()),
            prop::sample::select(VALUES.to_vec()),
            arb_subqueries(),
        ),
        0..6,
    );
    let ranges = prop::collection::vec(
        (
            prop::sample::select(RANGE_FEATURES.to_vec()),
            -8i64..30,
            arb_subqueries(),
        ),
        0..3,
    );
    (features, ranges).prop_map(|(features, ranges)| {
        let mut query = PredicateQuery::new();
        for (feature, value, subqueries) in features {
            query.add_feature_with_subqueries(feature, value, subqueries);
        }
        for (feature, value, subqueries) in ranges {
            query.add_range_feature_with_subqueries(feature, value, subqueries);
        }
        query
    })
}

/// Predicates as written in the JSON fixtures.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FixturePredicate {
    And { operands: Vec<FixturePredicate> },
    Or { operands: Vec<FixturePredicate> },
    Not { operand: Box<FixturePredicate> },
    In { feature: String, values: Vec<FixtureValue> },
    NotIn { feature: String, values: Vec<FixtureValue> },
    Range {
        feature: String,
        from: Option<i64>,
        to: Option<i64>,
    },
    True,
    False,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum FixtureValue {
    Integer(i64),
    String(String),
}

impl From<FixtureValue> for Value {
    fn from(value: FixtureValue) -> Self {
        match value {
            FixtureValue::Integer(value) => Value::Integer(value),
            FixtureValue::String(value) => Value::String(value),
        }
    }
}

impl From<FixturePredicate> for Predicate {
    fn from(predicate: FixturePredicate) -> Self {
        match predicate {
            FixturePredicate::And { operands } => {
                Predicate::and(operands.into_iter().map(Predicate::from))
            }
            FixturePredicate::Or { operands } => {
                Predicate::or(operands.into_iter().map(Predicate::from))
            }
            FixturePredicate::Not { operand } => Predicate::not(Predicate::from(*operand)),
            FixturePredicate::In { feature, values } => Predicate::feature_set(&feature, values),
            FixturePredicate::NotIn { feature, values } => {
                Predicate::feature_not_in(&feature, values)
            }
            FixturePredicate::Range { feature, from, to } => {
                Predicate::feature_range(&feature, from, to)
            }
            FixturePredicate::True => Predicate::True,
            FixturePredicate::False => Predicate::False,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct FixtureDocument {
    pub id: DocumentId,
    pub predicate: FixturePredicate,
}

#[derive(Deserialize, Debug)]
pub struct FixtureAssignment {
    pub feature: String,
    pub value: FixtureValue,
}

#[derive(Deserialize, Debug)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub features: Vec<FixtureAssignment>,
    #[serde(default)]
    pub ranges: Vec<(String, i64)>,
    pub expected: Vec<DocumentId>,
}

impl Scenario {
    pub fn query(&self) -> PredicateQuery {
        let mut query = PredicateQuery::new();
        for assignment in &self.features {
            query.add_feature(&assignment.feature, assignment.value.clone());
        }
        for (feature, value) in &self.ranges {
            query.add_range_feature(feature, *value);
        }
        query
    }
}

#[derive(Deserialize, Debug)]
pub struct Fixture {
    documents: Vec<FixtureDocument>,
    pub queries: Vec<Scenario>,
}

impl Fixture {
    pub fn load() -> Self {
        serde_json::from_str(include_str!("../testdata/targeting.json"))
            .expect("the targeting fixture should be valid JSON")
    }

    pub fn documents(&self) -> Vec<(DocumentId, Predicate)> {
        self.documents
            .iter()
            .cloned()
            .map(|document| (document.id, Predicate::from(document.predicate)))
            .collect()
    }
}
