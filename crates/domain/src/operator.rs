use std::collections::{BTreeSet, HashMap};

use reportdef_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::field::TypeSignature;

/// Filter operator declared by the report operators resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSchema {
    /// Operator name used as the backend key, e.g. `starts_with`.
    pub name: String,
    /// Human readable operator name.
    #[serde(default)]
    pub display_name: String,
    /// Operand key declarations, one per overload.
    pub schema: Vec<SchemaVariant>,
}

/// Left/right operand key names of one operator overload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SchemaVariantWire", into = "SchemaVariantWire")]
pub struct SchemaVariant {
    /// Backend key of the left operand, absent for bare predicates.
    pub left: Option<String>,
    /// Backend key of the right operand.
    pub right: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct OperandKeyWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaVariantWire {
    #[serde(default)]
    left: OperandKeyWire,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    right: Option<OperandKeyWire>,
}

impl From<SchemaVariantWire> for SchemaVariant {
    fn from(wire: SchemaVariantWire) -> Self {
        Self {
            left: wire.left.value,
            right: wire.right.and_then(|right| right.value),
        }
    }
}

impl From<SchemaVariant> for SchemaVariantWire {
    fn from(variant: SchemaVariant) -> Self {
        Self {
            left: OperandKeyWire {
                value: variant.left,
            },
            right: variant.right.map(|value| OperandKeyWire { value: Some(value) }),
        }
    }
}

/// Operand position within a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSide {
    /// Field being tested.
    Left,
    /// Value compared against.
    Right,
}

/// Backend keys resolved for one operator overload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorKeys {
    /// Position of the overload in the operator schema.
    pub variant_index: usize,
    /// Left operand key.
    pub left: Option<String>,
    /// Right operand key.
    pub right: Option<String>,
}

/// Explicit `(operator, variant) -> keys` table derived once from the catalog.
#[derive(Debug, Clone, Default)]
pub struct OperatorKeyTable {
    operators: HashMap<String, Vec<OperatorKeys>>,
}

impl OperatorKeyTable {
    /// Builds the table from operator schemas.
    #[must_use]
    pub fn from_schemas(schemas: &[OperatorSchema]) -> Self {
        let operators = schemas
            .iter()
            .map(|schema| {
                let variants = schema
                    .schema
                    .iter()
                    .enumerate()
                    .map(|(variant_index, variant)| OperatorKeys {
                        variant_index,
                        left: variant.left.clone(),
                        right: variant.right.clone(),
                    })
                    .collect();
                (schema.name.clone(), variants)
            })
            .collect();

        Self { operators }
    }

    /// Returns every overload declared for an operator.
    pub fn variants(&self, operator: &str) -> AppResult<&[OperatorKeys]> {
        self.operators
            .get(operator)
            .map(Vec::as_slice)
            .ok_or_else(|| AppError::NotFound(format!("unknown filter operator '{operator}'")))
    }

    /// Returns the keys of one overload.
    #[must_use]
    pub fn variant(&self, operator: &str, variant_index: usize) -> Option<&OperatorKeys> {
        self.operators
            .get(operator)
            .and_then(|variants| variants.get(variant_index))
    }

    /// Returns which operand a backend key denotes for an operator.
    pub fn side_of(&self, operator: &str, key: &str) -> AppResult<Option<OperandSide>> {
        let variants = self.variants(operator)?;
        if variants
            .iter()
            .any(|variant| variant.left.as_deref() == Some(key))
        {
            return Ok(Some(OperandSide::Left));
        }

        if variants
            .iter()
            .any(|variant| variant.right.as_deref() == Some(key))
        {
            return Ok(Some(OperandSide::Right));
        }

        Ok(None)
    }

    /// Resolves the keys to encode a rule with.
    ///
    /// Returns `None` for operators without a left key, which encode their
    /// left operand bare. Overloaded operators select the overload whose keys
    /// match the names synthesized from the operand signatures.
    pub fn resolve(
        &self,
        operator: &str,
        left: Option<&TypeSignature>,
        right: Option<&TypeSignature>,
    ) -> AppResult<Option<OperatorKeys>> {
        let variants = self.variants(operator)?;
        let left_keys: BTreeSet<&str> = variants
            .iter()
            .filter_map(|variant| variant.left.as_deref())
            .collect();
        let right_keys: BTreeSet<&str> = variants
            .iter()
            .filter_map(|variant| variant.right.as_deref())
            .collect();

        if left_keys.is_empty() {
            return Ok(None);
        }

        if left_keys.len() == 1 && right_keys.len() <= 1 {
            return Ok(Some(OperatorKeys {
                variant_index: variants
                    .iter()
                    .position(|variant| variant.left.is_some())
                    .unwrap_or_default(),
                left: left_keys.first().map(|key| (*key).to_owned()),
                right: right_keys.first().map(|key| (*key).to_owned()),
            }));
        }

        let left = left.ok_or_else(|| {
            AppError::Validation(format!(
                "operator '{operator}' is overloaded and needs the left field type"
            ))
        })?;
        let left_key = synthesize_left_key(left);
        let right_key = right.map(synthesize_right_key);

        variants
            .iter()
            .find(|variant| {
                variant.left.as_deref() == Some(left_key.as_str())
                    && (right_key.is_none() || variant.right == right_key)
            })
            .cloned()
            .map(Some)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "operator '{operator}' declares no overload for keys '{left_key}'/'{}'",
                    right_key.as_deref().unwrap_or("-")
                ))
            })
    }
}

/// Left key naming convention of overloaded operators.
#[must_use]
pub fn synthesize_left_key(signature: &TypeSignature) -> String {
    format!("search_{}{}", item_prefix(signature), signature.base)
}

/// Right key naming convention of overloaded operators.
///
/// A top-level `string` right operand is addressed as `query`.
#[must_use]
pub fn synthesize_right_key(signature: &TypeSignature) -> String {
    let base = match signature.base.as_str() {
        "string" => "query",
        other => other,
    };
    format!("in_{}{base}", item_prefix(signature))
}

fn item_prefix(signature: &TypeSignature) -> String {
    signature
        .item
        .as_deref()
        .map(|item| format!("{item}_"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        OperandSide, OperatorKeyTable, OperatorSchema, SchemaVariant, synthesize_left_key,
        synthesize_right_key,
    };
    use crate::field::TypeSignature;

    fn schemas() -> Vec<OperatorSchema> {
        serde_json::from_value(json!([
            {
                "name": "in",
                "displayName": "In",
                "schema": [
                    {"left": {"value": "search_string"}, "right": {"value": "in_string_array"}},
                    {"left": {"value": "search_integer"}, "right": {"value": "in_integer_array"}},
                    {"left": {"value": "search_string_array"}, "right": {"value": "in_query"}}
                ]
            },
            {
                "name": "starts_with",
                "displayName": "Starts with",
                "schema": [{"left": {"value": "value"}, "right": {"value": "prefix"}}]
            },
            {
                "name": "is_null",
                "displayName": "Is null",
                "schema": [{"left": {}}]
            }
        ]))
        .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn schema_variant_reads_empty_left_as_absent() {
        let variant: SchemaVariant =
            serde_json::from_value(json!({"left": {}})).unwrap_or_else(|_| unreachable!());
        assert_eq!(variant.left, None);
        assert_eq!(variant.right, None);
        assert_eq!(
            serde_json::to_value(&variant).unwrap_or_default(),
            json!({"left": {}})
        );
    }

    #[test]
    fn side_of_classifies_declared_keys() {
        let table = OperatorKeyTable::from_schemas(&schemas());
        assert_eq!(
            table.side_of("starts_with", "value").ok().flatten(),
            Some(OperandSide::Left)
        );
        assert_eq!(
            table.side_of("in", "in_integer_array").ok().flatten(),
            Some(OperandSide::Right)
        );
        assert!(table.side_of("matches", "value").is_err());
    }

    #[test]
    fn resolve_uses_declared_keys_for_single_overload() {
        let table = OperatorKeyTable::from_schemas(&schemas());
        let keys = table
            .resolve("starts_with", None, None)
            .unwrap_or_else(|_| unreachable!())
            .unwrap_or_else(|| unreachable!());
        assert_eq!(keys.left.as_deref(), Some("value"));
        assert_eq!(keys.right.as_deref(), Some("prefix"));

        assert!(matches!(table.resolve("is_null", None, None), Ok(None)));
    }

    #[test]
    fn resolve_selects_overload_by_signature() {
        let table = OperatorKeyTable::from_schemas(&schemas());
        let left = TypeSignature {
            base: "array".to_owned(),
            item: Some("string".to_owned()),
        };
        let right = TypeSignature::scalar("string");

        let keys = table
            .resolve("in", Some(&left), Some(&right))
            .unwrap_or_else(|_| unreachable!())
            .unwrap_or_else(|| unreachable!());
        assert_eq!(keys.variant_index, 2);
        assert_eq!(keys.right.as_deref(), Some("in_query"));

        let missing = table.resolve(
            "in",
            Some(&TypeSignature::scalar("boolean")),
            Some(&right),
        );
        assert!(missing.is_err());
    }

    #[test]
    fn key_synthesis_follows_naming_convention() {
        let integers = TypeSignature {
            base: "array".to_owned(),
            item: Some("integer".to_owned()),
        };
        assert_eq!(
            synthesize_left_key(&TypeSignature::scalar("integer")),
            "search_integer"
        );
        assert_eq!(synthesize_right_key(&integers), "in_integer_array");
        assert_eq!(
            synthesize_right_key(&TypeSignature::scalar("string")),
            "in_query"
        );
    }
}
