use serde::{Deserialize, Serialize};

use crate::field::FieldMetadata;

/// Join semantics of a non-root data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    /// Keep every row of the root data source.
    Left,
    /// Keep every row of the joined data source.
    Right,
}

/// Backend reference to a data source, as found in the `entities` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    /// Data source name, e.g. `applications`.
    pub entity: String,
    /// Join type, omitted for the root data source.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub join_type: Option<JoinType>,
}

impl EntityRef {
    /// Creates a root data source reference.
    #[must_use]
    pub fn root(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            join_type: None,
        }
    }
}

/// One selectable column of a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityColumn {
    /// Column path relative to its data source, e.g. `roles._id`.
    pub label: String,
    /// Fully-qualified field path, e.g. `applications.roles._id`.
    pub value: String,
    /// Backend type name.
    #[serde(rename = "type")]
    pub column_type: String,
}

impl EntityColumn {
    /// Builds a column from a field option, dropping the data source prefix from its label.
    #[must_use]
    pub fn from_field_option(entity: &str, path: &str, metadata: &FieldMetadata) -> Self {
        let relative = path
            .strip_prefix(entity)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(path);

        Self {
            label: relative.to_owned(),
            value: path.to_owned(),
            column_type: metadata.field_type.clone(),
        }
    }
}

/// UI definition of one data source and its selected columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDefinition {
    /// Data source name.
    pub data_source: String,
    /// Columns resolved from field options.
    #[serde(default)]
    pub data_source_columns: Vec<EntityColumn>,
    /// Related data sources. Always empty until the backend resolves relations.
    #[serde(default)]
    pub related_data_sources: Vec<EntityDefinition>,
    /// Selected column paths in display order.
    #[serde(default)]
    pub selected_columns: Vec<String>,
    /// Selected related data source names.
    #[serde(default)]
    pub selected_related_data_sources: Vec<String>,
    /// Join type for non-root data sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_type: Option<JoinType>,
}

impl EntityDefinition {
    /// Returns the display label of a column, if the column belongs to this data source.
    #[must_use]
    pub fn column_label(&self, path: &str) -> Option<&str> {
        self.data_source_columns
            .iter()
            .find(|column| column.value == path)
            .map(|column| column.label.as_str())
    }

    /// Returns whether a column path belongs to this data source.
    #[must_use]
    pub fn has_column(&self, path: &str) -> bool {
        self.column_label(path).is_some()
    }
}
