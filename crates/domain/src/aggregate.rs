use serde::{Deserialize, Serialize};
use serde_json::Value;

/// UI definition of one aggregate column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateDefinition {
    /// Column alias.
    pub label: String,
    /// Aggregate function name, e.g. `sum`.
    #[serde(rename = "type")]
    pub function: String,
    /// Aggregated field path.
    pub value: String,
}

/// Entry of the aggregate function catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateFunction {
    /// Function name.
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Operand schema as declared by the backend.
    #[serde(default)]
    pub schema: Value,
}
