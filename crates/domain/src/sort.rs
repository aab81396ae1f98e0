use serde::{Deserialize, Serialize};

/// Sort direction of a report sort clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// UI definition of one sort clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortDefinition {
    /// Sorted field path or aggregate alias.
    pub sort_by: String,
    /// Sort direction.
    pub direction: SortDirection,
}

/// Backend sort clause inside the `sort` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortClause {
    /// Sorted field path or aggregate alias.
    pub value: String,
    /// Sort direction.
    pub direction: SortDirection,
}

impl From<SortClause> for SortDefinition {
    fn from(clause: SortClause) -> Self {
        Self {
            sort_by: clause.value,
            direction: clause.direction,
        }
    }
}

impl From<&SortDefinition> for SortClause {
    fn from(definition: &SortDefinition) -> Self {
        Self {
            value: definition.sort_by.clone(),
            direction: definition.direction,
        }
    }
}
