use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use reportdef_core::{AppError, AppResult};
use reportdef_domain::{
    FieldClass, FieldMetadata, FieldOptions, FilterCondition, FilterGroup, FilterNode, FilterRule,
    LogicalOperator, OperandSide, OperatorKeyTable, RightValueType, RuleOperands, TypeSignature,
};
use serde_json::{Value, json};
use tracing::debug;

use super::options_state::LatestOptions;
use crate::operator_catalog::OperatorCatalog;
use crate::report_ports::{FieldOptionsSource, PayloadFragment, merge_fragments};

/// Operator keys and per-operator field options needed to encode filter rules.
#[derive(Clone, Copy)]
pub struct FilterEncodeContext<'a> {
    key_table: &'a OperatorKeyTable,
    operator_options: &'a HashMap<String, FieldOptions>,
}

impl<'a> FilterEncodeContext<'a> {
    /// Creates an encode context.
    #[must_use]
    pub fn new(
        key_table: &'a OperatorKeyTable,
        operator_options: &'a HashMap<String, FieldOptions>,
    ) -> Self {
        Self {
            key_table,
            operator_options,
        }
    }

    fn metadata(&self, operator: &str, path: &str) -> Option<&'a FieldMetadata> {
        self.operator_options
            .get(operator)
            .and_then(|options| options.get(path))
    }
}

/// Translates the filter tree between its UI shape and the backend `filter` payload.
pub struct FilterTranslator {
    field_options: Arc<dyn FieldOptionsSource>,
    operator_catalog: Arc<OperatorCatalog>,
    operator_options: LatestOptions<String, (PayloadFragment, FieldOptions)>,
}

impl FilterTranslator {
    /// Creates a filter translator.
    #[must_use]
    pub fn new(
        field_options: Arc<dyn FieldOptionsSource>,
        operator_catalog: Arc<OperatorCatalog>,
    ) -> Self {
        Self {
            field_options,
            operator_catalog,
            operator_options: LatestOptions::default(),
        }
    }

    /// Fetches the operands selectable for one operator given the current
    /// data sources and parameters.
    pub async fn field_options_for_filters(
        &self,
        entities: &PayloadFragment,
        parameters: &PayloadFragment,
        operator: &str,
    ) -> AppResult<FieldOptions> {
        let query = filter_options_query(entities, parameters, operator);

        let ticket = self.operator_options.ticket();
        let options = self.field_options.field_options(&query).await?;
        if !self
            .operator_options
            .publish(operator.to_owned(), ticket, (query, options.clone()))
            .await
        {
            debug!(operator, ticket, "dropped stale filter field options");
        }

        Ok(options)
    }

    /// Returns the latest options for an operator, fetching them when none
    /// were loaded for the same data sources and parameters.
    pub async fn resolved_field_options(
        &self,
        entities: &PayloadFragment,
        parameters: &PayloadFragment,
        operator: &str,
    ) -> AppResult<FieldOptions> {
        let query = filter_options_query(entities, parameters, operator);
        match self.operator_options.get(&operator.to_owned()).await {
            Some((loaded_for, options)) if loaded_for == query => Ok(options),
            _ => {
                self.field_options_for_filters(entities, parameters, operator)
                    .await
            }
        }
    }

    /// Forgets every loaded operator option set.
    pub async fn invalidate(&self) {
        self.operator_options.clear().await;
    }

    /// Decodes a backend filter into at most one top-level UI group.
    ///
    /// Right operands are classified as variable or literal against the field
    /// options of their operator, which are loaded first.
    pub async fn filter_definitions(
        &self,
        filter: Option<&Value>,
        entities: &PayloadFragment,
        parameters: &PayloadFragment,
    ) -> AppResult<Vec<FilterGroup>> {
        let Some(filter) = filter.filter(|value| !is_blank(value)) else {
            return Ok(Vec::new());
        };

        let node = FilterNode::from_value(filter)?;
        let key_table = self.operator_catalog.key_table().await?;

        let mut operators = BTreeSet::new();
        collect_right_operand_operators(&node, &key_table, &mut operators)?;
        let mut operator_options = HashMap::with_capacity(operators.len());
        for operator in operators {
            let options = self
                .resolved_field_options(entities, parameters, operator.as_str())
                .await?;
            operator_options.insert(operator, options);
        }

        let mut decoder = FilterDecoder {
            key_table: key_table.as_ref(),
            operator_options: &operator_options,
            next_index: 0,
        };
        let group = match &node {
            FilterNode::Group { operator, children } => decoder.group(*operator, children)?,
            FilterNode::Rule { .. } => {
                decoder.group(LogicalOperator::And, std::slice::from_ref(&node))?
            }
        };

        Ok(vec![group])
    }

    /// Builds the `filter` fragment from the single top-level group.
    pub fn filters_payload(
        definitions: &[FilterGroup],
        context: &FilterEncodeContext<'_>,
    ) -> AppResult<PayloadFragment> {
        let group = match definitions {
            [] => return Ok(PayloadFragment::new()),
            [group] => group,
            _ => {
                return Err(AppError::Validation(format!(
                    "a report holds a single top-level filter group, got {}",
                    definitions.len()
                )));
            }
        };

        let mut fragment = PayloadFragment::new();
        fragment.insert(
            "filter".to_owned(),
            Self::encode_group(group, context)?.to_value(),
        );
        Ok(fragment)
    }

    fn encode_group(group: &FilterGroup, context: &FilterEncodeContext<'_>) -> AppResult<FilterNode> {
        if group.subfilters.is_empty() {
            return Err(AppError::Validation(
                "filter groups must include at least one subfilter".to_owned(),
            ));
        }

        let children = group
            .subfilters
            .iter()
            .map(|condition| match condition {
                FilterCondition::Group(nested) => Self::encode_group(nested, context),
                FilterCondition::Rule(rule) => Ok(FilterNode::Rule {
                    operator: rule.operator.clone(),
                    operands: Self::compile_rule_operands(rule, context)?,
                }),
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(FilterNode::Group {
            operator: group.operator,
            children,
        })
    }

    /// Resolves the backend keys of a rule and wraps its right operand.
    pub fn compile_rule_operands(
        rule: &FilterRule,
        context: &FilterEncodeContext<'_>,
    ) -> AppResult<RuleOperands> {
        let operator = rule.operator.as_str();
        let left_signature = context
            .metadata(operator, rule.field.as_str())
            .map(FieldMetadata::signature);

        let right = match (&rule.value, rule.right_value_type()) {
            (None, _) => None,
            (Some(value), RightValueType::Literal) => Some((
                json!({ "literal": value }),
                Some(TypeSignature::of_literal_against(
                    value,
                    left_signature.as_ref(),
                )),
            )),
            (Some(value), RightValueType::Variable) => {
                let path = value.as_str().ok_or_else(|| {
                    AppError::Validation(format!(
                        "variable operand of '{operator}' must be a field path"
                    ))
                })?;
                let resolved = context.metadata(operator, path);
                let wrapped = match resolved.map(|metadata| metadata.class) {
                    Some(FieldClass::Parameter) => json!({ "parameter": value }),
                    Some(FieldClass::Literal) => json!({ "literal": value }),
                    Some(FieldClass::Json) | None => value.clone(),
                };
                Some((wrapped, resolved.map(FieldMetadata::signature)))
            }
        };

        let right_signature = right.as_ref().and_then(|(_, signature)| signature.as_ref());
        let keys = context
            .key_table
            .resolve(operator, left_signature.as_ref(), right_signature)?;
        let Some(keys) = keys else {
            return Ok(RuleOperands::Bare(Value::String(rule.field.clone())));
        };

        let mut operands = Vec::with_capacity(2);
        if let Some(left_key) = keys.left {
            operands.push((left_key, Value::String(rule.field.clone())));
        }

        if let Some((wrapped, _)) = right {
            let right_key = keys.right.ok_or_else(|| {
                AppError::Validation(format!("operator '{operator}' takes no right operand"))
            })?;
            operands.push((right_key, wrapped));
        }

        Ok(RuleOperands::Keyed(operands))
    }
}

struct FilterDecoder<'a> {
    key_table: &'a OperatorKeyTable,
    operator_options: &'a HashMap<String, FieldOptions>,
    next_index: u32,
}

impl FilterDecoder<'_> {
    fn unique_index(&mut self) -> u32 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn group(&mut self, operator: LogicalOperator, children: &[FilterNode]) -> AppResult<FilterGroup> {
        let unique_index = self.unique_index();
        if children.is_empty() {
            return Err(AppError::Validation(format!(
                "filter group '{}' must include at least one subfilter",
                operator.as_str()
            )));
        }

        let subfilters = children
            .iter()
            .map(|child| match child {
                FilterNode::Group { operator, children } => {
                    self.group(*operator, children).map(FilterCondition::Group)
                }
                FilterNode::Rule { operator, operands } => {
                    self.rule(operator, operands).map(FilterCondition::Rule)
                }
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(FilterGroup {
            operator,
            subfilters,
            unique_index,
        })
    }

    fn rule(&mut self, operator: &str, operands: &RuleOperands) -> AppResult<FilterRule> {
        let unique_index = self.unique_index();
        let (field, right) = match operands {
            RuleOperands::Bare(value) => (field_path(operator, value)?, None),
            RuleOperands::Keyed(keys) => {
                let mut field = None;
                let mut right = None;
                for (key, value) in keys {
                    match self.key_table.side_of(operator, key)? {
                        Some(OperandSide::Left) => field = Some(field_path(operator, value)?),
                        Some(OperandSide::Right) => right = Some(value),
                        None => {
                            return Err(AppError::Validation(format!(
                                "operator '{operator}' declares no operand key '{key}'"
                            )));
                        }
                    }
                }

                let field = field.ok_or_else(|| {
                    AppError::Validation(format!("rule '{operator}' has no left operand"))
                })?;
                (field, right)
            }
        };

        let (value, selected_right_value_type) = match right {
            Some(raw) => {
                let (value, value_type) = self.classify_right_value(operator, raw);
                (Some(value), Some(value_type))
            }
            None => (None, None),
        };

        Ok(FilterRule {
            field,
            operator: operator.to_owned(),
            value,
            selected_right_value_type,
            unique_index,
        })
    }

    fn classify_right_value(&self, operator: &str, raw: &Value) -> (Value, RightValueType) {
        match wrapped_value(raw, "literal") {
            Some(literal) => (literal.clone(), RightValueType::Literal),
            None => match wrapped_value(raw, "parameter") {
                Some(parameter) => (parameter.clone(), RightValueType::Variable),
                None => {
                    let is_variable = raw
                        .as_str()
                        .zip(self.operator_options.get(operator))
                        .is_some_and(|(path, options)| options.is_variable(path));
                    let value_type = if is_variable {
                        RightValueType::Variable
                    } else {
                        RightValueType::Literal
                    };
                    (raw.clone(), value_type)
                }
            },
        }
    }
}

fn collect_right_operand_operators(
    node: &FilterNode,
    key_table: &OperatorKeyTable,
    operators: &mut BTreeSet<String>,
) -> AppResult<()> {
    match node {
        FilterNode::Group { children, .. } => {
            for child in children {
                collect_right_operand_operators(child, key_table, operators)?;
            }
        }
        FilterNode::Rule {
            operator,
            operands: RuleOperands::Keyed(keys),
        } => {
            for (key, _) in keys {
                if key_table.side_of(operator, key)? == Some(OperandSide::Right) {
                    operators.insert(operator.clone());
                }
            }
        }
        FilterNode::Rule {
            operands: RuleOperands::Bare(_),
            ..
        } => {}
    }

    Ok(())
}

fn filter_options_query(
    entities: &PayloadFragment,
    parameters: &PayloadFragment,
    operator: &str,
) -> PayloadFragment {
    let mut query = merge_fragments([entities, parameters]);
    query.insert(
        "filter".to_owned(),
        json!({ operator: { "options": {} } }),
    );
    query
}

fn wrapped_value<'a>(raw: &'a Value, wrapper: &str) -> Option<&'a Value> {
    match raw {
        Value::Object(map) if map.len() == 1 => map.get(wrapper),
        _ => None,
    }
}

fn field_path(operator: &str, value: &Value) -> AppResult<String> {
    value.as_str().map(str::to_owned).ok_or_else(|| {
        AppError::Validation(format!(
            "left operand of '{operator}' must be a field path"
        ))
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use reportdef_domain::{
        FieldOptions, FilterCondition, FilterGroup, FilterRule, LogicalOperator, OperatorKeyTable,
        OperatorSchema, RightValueType,
    };
    use serde_json::{Value, json};

    use super::{FilterEncodeContext, FilterTranslator};

    fn key_table() -> OperatorKeyTable {
        let schemas: Vec<OperatorSchema> = serde_json::from_value(json!([
            {"name": "in", "schema": [
                {"left": {"value": "search_string"}, "right": {"value": "in_string_array"}},
                {"left": {"value": "search_integer"}, "right": {"value": "in_integer_array"}}
            ]},
            {"name": "gte", "schema": [{"left": {"value": "left"}, "right": {"value": "right"}}]},
            {"name": "is_null", "schema": [{"left": {}}]}
        ]))
        .unwrap_or_else(|_| unreachable!());
        OperatorKeyTable::from_schemas(&schemas)
    }

    fn operator_options() -> HashMap<String, FieldOptions> {
        let options: FieldOptions = serde_json::from_value(json!({
            "users.loginCount": {"class": "json", "type": "integer"},
            "users.userName": {"class": "json", "type": "string"},
            "minimumLogins": {"class": "parameter", "type": "integer"}
        }))
        .unwrap_or_else(|_| unreachable!());

        ["in", "gte"]
            .into_iter()
            .map(|operator| (operator.to_owned(), options.clone()))
            .collect()
    }

    fn rule(operator: &str, field: &str, value: Option<Value>, value_type: RightValueType) -> FilterRule {
        FilterRule {
            field: field.to_owned(),
            operator: operator.to_owned(),
            value,
            selected_right_value_type: Some(value_type),
            unique_index: 1,
        }
    }

    #[test]
    fn overloaded_operator_keys_follow_operand_types() {
        let table = key_table();
        let options = operator_options();
        let context = FilterEncodeContext::new(&table, &options);

        let group = FilterGroup {
            operator: LogicalOperator::Or,
            subfilters: vec![
                FilterCondition::Rule(rule(
                    "in",
                    "users.loginCount",
                    Some(json!([1, 2])),
                    RightValueType::Literal,
                )),
                FilterCondition::Rule(rule(
                    "gte",
                    "users.loginCount",
                    Some(json!("minimumLogins")),
                    RightValueType::Variable,
                )),
                FilterCondition::Rule(rule("is_null", "users.userName", None, RightValueType::Literal)),
            ],
            unique_index: 0,
        };

        let payload = FilterTranslator::filters_payload(&[group], &context)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(
            payload.get("filter"),
            Some(&json!({
                "or": [
                    {"in": {"search_integer": "users.loginCount", "in_integer_array": {"literal": [1, 2]}}},
                    {"gte": {"left": "users.loginCount", "right": {"parameter": "minimumLogins"}}},
                    {"is_null": "users.userName"}
                ]
            }))
        );
    }

    #[test]
    fn json_variable_is_emitted_unwrapped() {
        let table = key_table();
        let options = operator_options();
        let context = FilterEncodeContext::new(&table, &options);

        let operands = FilterTranslator::compile_rule_operands(
            &rule(
                "gte",
                "users.loginCount",
                Some(json!("users.userName")),
                RightValueType::Variable,
            ),
            &context,
        );
        assert_eq!(
            operands.ok(),
            Some(reportdef_domain::RuleOperands::Keyed(vec![
                ("left".to_owned(), json!("users.loginCount")),
                ("right".to_owned(), json!("users.userName")),
            ]))
        );
    }

    #[test]
    fn overloaded_operator_without_matching_variant_is_rejected() {
        let table = key_table();
        let options = operator_options();
        let context = FilterEncodeContext::new(&table, &options);

        let result = FilterTranslator::compile_rule_operands(
            &rule("in", "users.userName", Some(json!(true)), RightValueType::Literal),
            &context,
        );
        assert!(result.is_err());
    }

    #[test]
    fn empty_list_literal_uses_the_left_field_overload() {
        let table = key_table();
        let options = operator_options();
        let context = FilterEncodeContext::new(&table, &options);

        let operands = FilterTranslator::compile_rule_operands(
            &rule("in", "users.userName", Some(json!([])), RightValueType::Literal),
            &context,
        );
        assert_eq!(
            operands.ok(),
            Some(reportdef_domain::RuleOperands::Keyed(vec![
                ("search_string".to_owned(), json!("users.userName")),
                ("in_string_array".to_owned(), json!({"literal": []})),
            ]))
        );
    }

    #[test]
    fn more_than_one_top_level_group_is_rejected() {
        let table = key_table();
        let options = operator_options();
        let context = FilterEncodeContext::new(&table, &options);
        let group = FilterGroup {
            operator: LogicalOperator::And,
            subfilters: vec![FilterCondition::Rule(rule(
                "is_null",
                "users.userName",
                None,
                RightValueType::Literal,
            ))],
            unique_index: 0,
        };

        assert!(FilterTranslator::filters_payload(&[group.clone(), group], &context).is_err());
        assert!(
            FilterTranslator::filters_payload(&[], &context)
                .is_ok_and(|payload| payload.is_empty())
        );
    }
}
