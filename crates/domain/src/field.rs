use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Origin of a field option returned by the field options resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    /// Real data source column.
    Json,
    /// Declared report parameter.
    Parameter,
    /// Literal value slot.
    Literal,
}

impl FieldClass {
    /// Returns whether options of this class can be picked as a variable.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Json | Self::Parameter)
    }
}

/// Item type of an array-typed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldItem {
    /// Element type name.
    #[serde(rename = "type")]
    pub item_type: String,
}

/// Metadata for one fully-qualified field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    /// Field origin.
    pub class: FieldClass,
    /// Optional display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Backend type name, e.g. `string`, `integer` or `array`.
    #[serde(rename = "type")]
    pub field_type: String,
    /// Element type for array fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<FieldItem>,
}

impl FieldMetadata {
    /// Returns the type signature used for operator key synthesis.
    #[must_use]
    pub fn signature(&self) -> TypeSignature {
        TypeSignature {
            base: self.field_type.clone(),
            item: self.item.as_ref().map(|item| item.item_type.clone()),
        }
    }
}

/// Base type plus optional element type of an operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSignature {
    /// Base type name.
    pub base: String,
    /// Element type name for arrays.
    pub item: Option<String>,
}

impl TypeSignature {
    /// Creates a signature without an element type.
    #[must_use]
    pub fn scalar(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            item: None,
        }
    }

    /// Derives the signature of a literal from its runtime JSON type.
    #[must_use]
    pub fn of_literal(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self {
                base: "array".to_owned(),
                item: items.first().map(|item| Self::runtime_type(item).to_owned()),
            },
            other => Self::scalar(Self::runtime_type(other)),
        }
    }

    /// Derives the signature of a literal compared against a left operand.
    ///
    /// An empty array carries no element type, so it takes the left
    /// operand's element type, or its base type when the left is a scalar.
    #[must_use]
    pub fn of_literal_against(value: &Value, left: Option<&TypeSignature>) -> Self {
        let signature = Self::of_literal(value);
        match (signature.item.is_none() && signature.base == "array", left) {
            (true, Some(left)) => Self {
                base: signature.base,
                item: Some(left.item.clone().unwrap_or_else(|| left.base.clone())),
            },
            _ => signature,
        }
    }

    fn runtime_type(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(number) if number.is_i64() || number.is_u64() => "integer",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

/// One entry of a field options response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOption {
    /// Fully-qualified field path, e.g. `applications.name`.
    pub path: String,
    /// Field metadata.
    pub metadata: FieldMetadata,
}

/// Field metadata keyed by path, in the order the backend returned it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOptions {
    options: Vec<FieldOption>,
}

impl FieldOptions {
    /// Creates field options from ordered entries.
    #[must_use]
    pub fn new(options: Vec<FieldOption>) -> Self {
        Self { options }
    }

    /// Returns metadata for one path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FieldMetadata> {
        self.options
            .iter()
            .find(|option| option.path == path)
            .map(|option| &option.metadata)
    }

    /// Returns whether a path can be used as a variable operand.
    #[must_use]
    pub fn is_variable(&self, path: &str) -> bool {
        self.get(path)
            .is_some_and(|metadata| metadata.class.is_variable())
    }

    /// Returns all entries in backend order.
    #[must_use]
    pub fn options(&self) -> &[FieldOption] {
        &self.options
    }

    /// Returns an iterator over entries of one class.
    pub fn of_class(&self, class: FieldClass) -> impl Iterator<Item = &FieldOption> {
        self.options
            .iter()
            .filter(move |option| option.metadata.class == class)
    }

    /// Returns whether no options were resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Merges another option set, keeping existing entries on path collisions.
    pub fn extend(&mut self, other: &FieldOptions) {
        for option in &other.options {
            if self.get(option.path.as_str()).is_none() {
                self.options.push(option.clone());
            }
        }
    }
}

impl Serialize for FieldOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.options.len()))?;
        for option in &self.options {
            map.serialize_entry(&option.path, &option.metadata)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldOptionsVisitor;

        impl<'de> Visitor<'de> for FieldOptionsVisitor {
            type Value = FieldOptions;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of field paths to field metadata")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldOptions, A::Error> {
                let mut options = Vec::with_capacity(access.size_hint().unwrap_or_default());
                while let Some((path, metadata)) = access.next_entry::<String, FieldMetadata>()? {
                    options.push(FieldOption { path, metadata });
                }

                Ok(FieldOptions { options })
            }
        }

        deserializer.deserialize_map(FieldOptionsVisitor)
    }
}
