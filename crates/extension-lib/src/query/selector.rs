//! Label selector evaluation
//!
//! Workload selectors combine `matchLabels` (exact equality) with
//! `matchExpressions` using the `In`, `NotIn`, `Exists` and `DoesNotExist`
//! operators. All terms are ANDed; a selector without terms matches
//! everything.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("unknown selector operator {operator:?} for key {key:?}")]
    UnknownOperator { key: String, operator: String },

    #[error("operator {operator} for key {key:?} requires at least one value")]
    MissingValues { key: String, operator: String },

    #[error("operator {operator} for key {key:?} takes no values")]
    UnexpectedValues { key: String, operator: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Equals { key: String, value: String },
    In { key: String, values: BTreeSet<String> },
    NotIn { key: String, values: BTreeSet<String> },
    Exists { key: String },
    DoesNotExist { key: String },
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals { key, value } => labels.get(key) == Some(value),
            Requirement::In { key, values } => labels.get(key).is_some_and(|v| values.contains(v)),
            // absent keys satisfy NotIn
            Requirement::NotIn { key, values } => labels.get(key).map_or(true, |v| !values.contains(v)),
            Requirement::Exists { key } => labels.contains_key(key),
            Requirement::DoesNotExist { key } => !labels.contains_key(key),
        }
    }

    fn from_expression(expr: &LabelSelectorRequirement) -> Result<Self, SelectorError> {
        let key = expr.key.clone();
        let values: BTreeSet<String> = expr.values.iter().flatten().cloned().collect();
        let operator = expr.operator.as_str();

        match operator {
            "In" | "NotIn" if values.is_empty() => Err(SelectorError::MissingValues {
                key,
                operator: operator.to_string(),
            }),
            "Exists" | "DoesNotExist" if !values.is_empty() => Err(SelectorError::UnexpectedValues {
                key,
                operator: operator.to_string(),
            }),
            "In" => Ok(Requirement::In { key, values }),
            "NotIn" => Ok(Requirement::NotIn { key, values }),
            "Exists" => Ok(Requirement::Exists { key }),
            "DoesNotExist" => Ok(Requirement::DoesNotExist { key }),
            other => Err(SelectorError::UnknownOperator {
                key,
                operator: other.to_string(),
            }),
        }
    }
}

/// Parsed label selector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Equality-only selector, as carried by Services
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Self {
        Self {
            requirements: labels
                .iter()
                .map(|(key, value)| Requirement::Equals {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        let empty = BTreeMap::new();
        let labels = labels.unwrap_or(&empty);
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl TryFrom<&LabelSelector> for Selector {
    type Error = SelectorError;

    fn try_from(selector: &LabelSelector) -> Result<Self, Self::Error> {
        let mut parsed = selector
            .match_labels
            .as_ref()
            .map(Selector::from_labels)
            .unwrap_or_default();

        for expr in selector.match_expressions.iter().flatten() {
            parsed.requirements.push(Requirement::from_expression(expr)?);
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn expr(key: &str, operator: &str, values: &[&str]) -> LabelSelectorRequirement {
        LabelSelectorRequirement {
            key: key.to_string(),
            operator: operator.to_string(),
            values: (!values.is_empty()).then(|| values.iter().map(|v| v.to_string()).collect()),
        }
    }

    #[test]
    fn test_match_labels_require_equality() {
        let selector = Selector::from_labels(&labels(&[("app", "shop")]));
        assert!(selector.matches(Some(&labels(&[("app", "shop"), ("tier", "web")]))));
        assert!(!selector.matches(Some(&labels(&[("app", "cart")]))));
        assert!(!selector.matches(None));
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector = Selector::try_from(&LabelSelector::default()).unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(None));
        assert!(selector.matches(Some(&labels(&[("app", "shop")]))));
    }

    #[test]
    fn test_match_expressions_are_anded() {
        let selector = Selector::try_from(&LabelSelector {
            match_labels: Some(labels(&[("app", "shop")])),
            match_expressions: Some(vec![
                expr("tier", "In", &["web", "api"]),
                expr("track", "NotIn", &["canary"]),
                expr("team", "Exists", &[]),
                expr("legacy", "DoesNotExist", &[]),
            ]),
        })
        .unwrap();

        let matching = labels(&[("app", "shop"), ("tier", "api"), ("team", "checkout")]);
        assert!(selector.matches(Some(&matching)));

        let canary = labels(&[("app", "shop"), ("tier", "api"), ("team", "x"), ("track", "canary")]);
        assert!(!selector.matches(Some(&canary)));

        let legacy = labels(&[("app", "shop"), ("tier", "web"), ("team", "x"), ("legacy", "1")]);
        assert!(!selector.matches(Some(&legacy)));

        let no_team = labels(&[("app", "shop"), ("tier", "web")]);
        assert!(!selector.matches(Some(&no_team)));
    }

    #[test]
    fn test_invalid_expressions_are_rejected() {
        let unknown = LabelSelector {
            match_expressions: Some(vec![expr("tier", "Gt", &["1"])]),
            ..Default::default()
        };
        assert!(matches!(
            Selector::try_from(&unknown),
            Err(SelectorError::UnknownOperator { .. })
        ));

        let missing = LabelSelector {
            match_expressions: Some(vec![expr("tier", "In", &[])]),
            ..Default::default()
        };
        assert!(matches!(
            Selector::try_from(&missing),
            Err(SelectorError::MissingValues { .. })
        ));

        let unexpected = LabelSelector {
            match_expressions: Some(vec![expr("tier", "Exists", &["web"])]),
            ..Default::default()
        };
        assert!(matches!(
            Selector::try_from(&unexpected),
            Err(SelectorError::UnexpectedValues { .. })
        ));
    }
}
