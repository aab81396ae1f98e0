use std::collections::BTreeSet;

use reportdef_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::reference::ReferenceRemoval;

/// Boolean combinator of a filter group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    /// Every subfilter must match.
    And,
    /// Any subfilter may match.
    Or,
}

impl LogicalOperator {
    /// Parses a backend key into a combinator.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            _ => None,
        }
    }

    /// Returns the stable backend key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// How the right operand of a rule is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RightValueType {
    /// Reference to a data source field or a parameter.
    Variable,
    /// Free literal value.
    Literal,
}

/// UI shape of one filter rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    /// Left operand field path.
    pub field: String,
    /// Rule operator name.
    pub operator: String,
    /// Right operand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Right operand interpretation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_right_value_type: Option<RightValueType>,
    /// Stable list identity.
    pub unique_index: u32,
}

impl FilterRule {
    /// Returns the effective right operand interpretation.
    #[must_use]
    pub fn right_value_type(&self) -> RightValueType {
        self.selected_right_value_type
            .unwrap_or(RightValueType::Literal)
    }

    /// Returns every field path or parameter name the rule depends on.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        let variable = match (self.right_value_type(), self.value.as_ref()) {
            (RightValueType::Variable, Some(Value::String(path))) => Some(path.as_str()),
            _ => None,
        };

        std::iter::once(self.field.as_str()).chain(variable)
    }
}

/// UI shape of a nested filter group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGroup {
    /// Group combinator.
    pub operator: LogicalOperator,
    /// Nested rules and groups.
    pub subfilters: Vec<FilterCondition>,
    /// Stable list identity.
    pub unique_index: u32,
}

/// Rule or nested group inside a filter group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterCondition {
    /// Nested group.
    Group(FilterGroup),
    /// Leaf rule.
    Rule(FilterRule),
}

impl FilterGroup {
    /// Removes rules referencing a deleted item.
    ///
    /// Groups left without subfilters are removed in turn; `None` means the
    /// whole group became empty.
    #[must_use]
    pub fn prune(&self, removal: &ReferenceRemoval) -> Option<FilterGroup> {
        let subfilters: Vec<FilterCondition> = self
            .subfilters
            .iter()
            .filter_map(|condition| match condition {
                FilterCondition::Rule(rule) => (!rule
                    .references()
                    .any(|reference| removal.matches(reference)))
                .then(|| FilterCondition::Rule(rule.clone())),
                FilterCondition::Group(group) => group.prune(removal).map(FilterCondition::Group),
            })
            .collect();

        (!subfilters.is_empty()).then(|| FilterGroup {
            operator: self.operator,
            subfilters,
            unique_index: self.unique_index,
        })
    }

    /// Returns the distinct rule operators used anywhere in the group.
    #[must_use]
    pub fn rule_operators(&self) -> BTreeSet<String> {
        let mut operators = BTreeSet::new();
        self.collect_rule_operators(&mut operators);
        operators
    }

    fn collect_rule_operators(&self, operators: &mut BTreeSet<String>) {
        for condition in &self.subfilters {
            match condition {
                FilterCondition::Rule(rule) => {
                    operators.insert(rule.operator.clone());
                }
                FilterCondition::Group(group) => group.collect_rule_operators(operators),
            }
        }
    }
}

/// Prunes references from the filter setting, dropping it entirely once empty.
#[must_use]
pub fn prune_filter_definitions(
    definitions: &[FilterGroup],
    removal: &ReferenceRemoval,
) -> Vec<FilterGroup> {
    definitions
        .iter()
        .filter_map(|group| group.prune(removal))
        .collect()
}

/// Operands of a backend rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOperands {
    /// Operand keys in backend order, e.g. `value`/`prefix`.
    Keyed(Vec<(String, Value)>),
    /// Single operand without key structure.
    Bare(Value),
}

/// Backend filter tree keyed by operator name at every level.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// `and`/`or` group.
    Group {
        /// Group combinator.
        operator: LogicalOperator,
        /// Child nodes.
        children: Vec<FilterNode>,
    },
    /// Leaf rule.
    Rule {
        /// Rule operator name.
        operator: String,
        /// Rule operands.
        operands: RuleOperands,
    },
}

impl FilterNode {
    /// Decodes one backend node by its single operator key.
    pub fn from_value(value: &Value) -> AppResult<Self> {
        let Value::Object(map) = value else {
            return Err(AppError::Validation(
                "filter node must be a JSON object".to_owned(),
            ));
        };

        let mut entries = map.iter();
        let (Some((operator, body)), None) = (entries.next(), entries.next()) else {
            return Err(AppError::Validation(format!(
                "filter node must hold exactly one operator key, found {}",
                map.len()
            )));
        };

        if let Some(logical) = LogicalOperator::parse(operator) {
            let Value::Array(children) = body else {
                return Err(AppError::Validation(format!(
                    "filter group '{operator}' must hold an array of nodes"
                )));
            };

            return Ok(Self::Group {
                operator: logical,
                children: children
                    .iter()
                    .map(Self::from_value)
                    .collect::<AppResult<Vec<_>>>()?,
            });
        }

        let operands = match body {
            Value::Object(keys) => RuleOperands::Keyed(
                keys.iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            other => RuleOperands::Bare(other.clone()),
        };

        Ok(Self::Rule {
            operator: operator.clone(),
            operands,
        })
    }

    /// Encodes the node into backend JSON.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let (key, body) = match self {
            Self::Group { operator, children } => (
                operator.as_str().to_owned(),
                Value::Array(children.iter().map(Self::to_value).collect()),
            ),
            Self::Rule { operator, operands } => {
                let body = match operands {
                    RuleOperands::Keyed(keys) => Value::Object(keys.iter().cloned().collect()),
                    RuleOperands::Bare(value) => value.clone(),
                };
                (operator.clone(), body)
            }
        };

        let mut node = Map::with_capacity(1);
        node.insert(key, body);
        Value::Object(node)
    }
}
