use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

#[derive(Clone, Debug, Eq, Default)]
pub struct Labels(Arc<Map>);

pub type Map = BTreeMap<String, String>;

pub type Expressions = Vec<Expression>;

/// A set-based requirement over a single label key.
///
/// `key` and `operator` are required by the selector grammar but are tolerated when absent so that
/// a malformed document surfaces as an [`InvalidSelector`] at evaluation time rather than silently
/// dropping the clause.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Expression {
    #[serde(default)]
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operator: Option<Operator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    values: Option<BTreeSet<String>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// Selects a set of pods or namespaces by their labels.
///
/// An absent clause and a present-but-empty clause both match everything.
#[derive(Clone, Debug, Eq, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    #[serde(default, alias = "match_labels", skip_serializing_if = "Option::is_none")]
    match_labels: Option<Map>,
    #[serde(
        default,
        alias = "match_expressions",
        skip_serializing_if = "Option::is_none"
    )]
    match_expressions: Option<Expressions>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidSelector {
    #[error("selector expression is missing a key")]
    MissingKey,

    #[error("selector expression for {0:?} is missing an operator")]
    MissingOperator(String),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid label filter term: {0:?}")]
pub struct InvalidLabelFilter(String);

// === Selector ===

impl Selector {
    pub fn from_expressions(exprs: Expressions) -> Self {
        Self {
            match_labels: None,
            match_expressions: Some(exprs),
        }
    }

    pub fn from_map(map: Map) -> Self {
        Self {
            match_labels: Some(map),
            match_expressions: None,
        }
    }

    /// Adds an expression clause to the selector.
    pub fn with_expression(mut self, expr: Expression) -> Self {
        self.match_expressions.get_or_insert_with(Vec::new).push(expr);
        self
    }

    /// Indicates whether the selector has no effective clauses and therefore selects everything.
    pub fn is_empty(&self) -> bool {
        self.match_labels.as_ref().map_or(true, Map::is_empty)
            && self.match_expressions.as_ref().map_or(true, Vec::is_empty)
    }

    pub fn match_labels(&self) -> Option<&Map> {
        self.match_labels.as_ref()
    }

    pub fn validate(&self) -> Result<(), InvalidSelector> {
        for expr in self.match_expressions.iter().flatten() {
            expr.validate()?;
        }
        Ok(())
    }

    /// Returns true iff the labels satisfy every equality and expression clause.
    ///
    /// Fails if any expression clause is malformed, even if another clause would already reject
    /// the labels.
    pub fn matches(&self, labels: &Labels) -> Result<bool, InvalidSelector> {
        self.validate()?;

        for expr in self.match_expressions.iter().flatten() {
            if !expr.matches(labels.as_ref()) {
                return Ok(false);
            }
        }

        if let Some(match_labels) = self.match_labels.as_ref() {
            for (k, v) in match_labels.iter() {
                if labels.0.get(k) != Some(v) {
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    /// Renders the equality clause as an API-server label filter (`k=v,k2=v2`).
    ///
    /// Expression clauses cannot be expressed by an equality filter and are not included, so
    /// results fetched with this filter must still be checked with [`Selector::matches`].
    pub fn label_filter(&self) -> Option<String> {
        let labels = self.match_labels.as_ref().filter(|m| !m.is_empty())?;
        let terms = labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>();
        Some(terms.join(","))
    }
}

/// Parses an equality-only label filter, as produced by [`Selector::label_filter`].
impl std::str::FromStr for Selector {
    type Err = InvalidLabelFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut map = Map::new();
        for term in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (k, v) = term
                .split_once("==")
                .or_else(|| term.split_once('='))
                .ok_or_else(|| InvalidLabelFilter(term.to_string()))?;
            let k = k.trim();
            if k.is_empty() {
                return Err(InvalidLabelFilter(term.to_string()));
            }
            map.insert(k.to_string(), v.trim().to_string());
        }
        Ok(Self::from_map(map))
    }
}

impl std::iter::FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl std::iter::FromIterator<Expression> for Selector {
    fn from_iter<T: IntoIterator<Item = Expression>>(iter: T) -> Self {
        Self::from_expressions(iter.into_iter().collect())
    }
}

// === Labels ===

impl Labels {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl From<Map> for Labels {
    #[inline]
    fn from(labels: Map) -> Self {
        Self(Arc::new(labels))
    }
}

impl From<Option<Map>> for Labels {
    #[inline]
    fn from(labels: Option<Map>) -> Self {
        labels.unwrap_or_default().into()
    }
}

impl AsRef<Map> for Labels {
    #[inline]
    fn as_ref(&self) -> &Map {
        self.0.as_ref()
    }
}

impl<T: AsRef<Map>> std::cmp::PartialEq<T> for Labels {
    #[inline]
    fn eq(&self, t: &T) -> bool {
        self.0.as_ref().eq(t.as_ref())
    }
}

impl std::iter::FromIterator<(String, String)> for Labels {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Labels {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for (k, v) in self.0.iter() {
            write!(f, "{sep}{k}={v}")?;
            sep = ",";
        }
        Ok(())
    }
}

// === Expression ===

impl Expression {
    pub fn new<V>(key: impl ToString, operator: Operator, values: impl IntoIterator<Item = V>) -> Self
    where
        V: ToString,
    {
        let values = values
            .into_iter()
            .map(|v| v.to_string())
            .collect::<BTreeSet<_>>();
        Self {
            key: key.to_string(),
            operator: Some(operator),
            values: Some(values),
        }
    }

    pub fn exists(key: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            operator: Some(Operator::Exists),
            values: None,
        }
    }

    pub fn does_not_exist(key: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            operator: Some(Operator::DoesNotExist),
            values: None,
        }
    }

    fn validate(&self) -> Result<Operator, InvalidSelector> {
        if self.key.is_empty() {
            return Err(InvalidSelector::MissingKey);
        }
        self.operator
            .ok_or_else(|| InvalidSelector::MissingOperator(self.key.clone()))
    }

    /// Must only be called on a validated expression.
    fn matches(&self, labels: &Map) -> bool {
        let contains = |v: &String| self.values.as_ref().is_some_and(|vs| vs.contains(v));
        match self.operator {
            Some(Operator::In) => labels.get(&self.key).is_some_and(contains),
            Some(Operator::NotIn) => !labels.get(&self.key).is_some_and(contains),
            Some(Operator::Exists) => labels.contains_key(&self.key),
            Some(Operator::DoesNotExist) => !labels.contains_key(&self.key),
            None => false,
        }
    }
}
