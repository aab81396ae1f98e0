use serde::{Deserialize, Serialize};

use crate::field::FieldItem;

/// Where the values of a parameter come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSource {
    /// Free input of a basic type.
    #[default]
    Basic,
    /// Values of a managed object attribute.
    Datasource,
}

/// One allowed value of an enumerated parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumeratedValue {
    /// Display name.
    pub name: String,
    /// Submitted value.
    pub value: String,
}

/// UI definition of one report parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    /// Parameter name, unique within a report.
    pub parameter_name: String,
    /// Input label.
    #[serde(default)]
    pub input_label: String,
    /// Input help text.
    #[serde(default)]
    pub help_text: String,
    /// Scalar input type, the element type when multivalued.
    pub input_type: String,
    /// Whether the parameter accepts several values.
    #[serde(default)]
    pub multivalued: bool,
    /// Value source.
    #[serde(default)]
    pub source: ParameterSource,
    /// Managed object backing a datasource parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    /// Managed object attribute backing a datasource parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_property: Option<String>,
    /// Allowed values.
    #[serde(default)]
    pub enumerated_values: Vec<EnumeratedValue>,
}

/// Backend declaration of one parameter inside the `parameters` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    /// Input label.
    #[serde(default)]
    pub label: String,
    /// Help text.
    #[serde(default)]
    pub description: String,
    /// Declared type, `array` for multivalued parameters.
    #[serde(rename = "type")]
    pub parameter_type: String,
    /// Element type of multivalued parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<FieldItem>,
    /// Value source.
    #[serde(default)]
    pub source: ParameterSource,
    /// Managed object for datasource parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Managed object attribute for datasource parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Allowed values.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enumerated_values: Option<Vec<EnumeratedValue>>,
}

/// Entry of a parameter type catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterTypeDecl {
    /// Type name, or managed object name for datasource types.
    pub name: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Selectable attributes of a datasource type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
}
