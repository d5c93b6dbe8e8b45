use crate::predicate::Value;

/// Bitmap selecting every sub-query.
pub const ALL_SUBQUERIES: u64 = u64::MAX;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureAssignment {
    pub feature: String,
    pub value: Value,
    pub subqueries: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeAssignment {
    pub feature: String,
    pub value: i64,
    pub subqueries: u64,
}

/// The concrete feature values a search is evaluated against.
///
/// Each assignment carries a 64-bit sub-query bitmap, so one search can answer
/// up to 64 queries that share most of their assignments. Bit `k` set means
/// the assignment belongs to sub-query `k`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PredicateQuery {
    features: Vec<FeatureAssignment>,
    range_features: Vec<RangeAssignment>,
}

impl PredicateQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_feature(&mut self, feature: &str, value: impl Into<Value>) -> &mut Self {
        self.add_feature_with_subqueries(feature, value, ALL_SUBQUERIES)
    }

    pub fn add_feature_with_subqueries(
        &mut self,
        feature: &str,
        value: impl Into<Value>,
        subqueries: u64,
    ) -> &mut Self {
        self.features.push(FeatureAssignment {
            feature: feature.to_owned(),
            value: value.into(),
            subqueries,
        });
        self
    }

    /// The value is expanded into range partitions when searching, with the
    /// arity of the index being searched.
    pub fn add_range_feature(&mut self, feature: &str, value: i64) -> &mut Self {
        self.add_range_feature_with_subqueries(feature, value, ALL_SUBQUERIES)
    }

    pub fn add_range_feature_with_subqueries(
        &mut self,
        feature: &str,
        value: i64,
        subqueries: u64,
    ) -> &mut Self {
        self.range_features.push(RangeAssignment {
            feature: feature.to_owned(),
            value,
            subqueries,
        });
        self
    }

    pub fn features(&self) -> &[FeatureAssignment] {
        &self.features
    }

    pub fn range_features(&self) -> &[RangeAssignment] {
        &self.range_features
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty() && self.range_features.is_empty()
    }
}
