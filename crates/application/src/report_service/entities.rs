use std::collections::HashSet;
use std::sync::Arc;

use reportdef_core::{AppError, AppResult};
use reportdef_domain::{EntityColumn, EntityDefinition, EntityRef, FieldClass};
use serde_json::{Value, json};

use crate::report_ports::{FieldOptionsSource, PayloadFragment};

/// Translates data source definitions to and from the `entities`/`fields` payload.
pub struct EntityTranslator {
    field_options: Arc<dyn FieldOptionsSource>,
}

impl EntityTranslator {
    /// Creates an entity translator.
    #[must_use]
    pub fn new(field_options: Arc<dyn FieldOptionsSource>) -> Self {
        Self { field_options }
    }

    /// Resolves data source references into definitions with their columns.
    ///
    /// Issues one field options query per reference. Related data sources are
    /// left empty until the backend resolves relations.
    pub async fn entity_definitions(
        &self,
        entity_refs: &[EntityRef],
    ) -> AppResult<Vec<EntityDefinition>> {
        let mut definitions = Vec::with_capacity(entity_refs.len());
        for entity_ref in entity_refs {
            let options = self
                .field_options
                .field_options(&entity_options_query(entity_ref.entity.as_str()))
                .await?;

            let data_source_columns = options
                .of_class(FieldClass::Json)
                .map(|option| {
                    EntityColumn::from_field_option(
                        entity_ref.entity.as_str(),
                        option.path.as_str(),
                        &option.metadata,
                    )
                })
                .collect();

            definitions.push(EntityDefinition {
                data_source: entity_ref.entity.clone(),
                data_source_columns,
                related_data_sources: Vec::new(),
                selected_columns: Vec::new(),
                selected_related_data_sources: Vec::new(),
                join_type: entity_ref.join_type,
            });
        }

        Ok(definitions)
    }

    /// Builds the `entities`/`fields` fragment.
    ///
    /// The first definition is the root data source and carries no join type.
    /// Fields keep selection order across definitions, without duplicates.
    pub fn entities_payload(definitions: &[EntityDefinition]) -> AppResult<PayloadFragment> {
        let entities: Vec<EntityRef> = definitions
            .iter()
            .enumerate()
            .map(|(position, definition)| EntityRef {
                entity: definition.data_source.clone(),
                join_type: if position == 0 {
                    None
                } else {
                    definition.join_type
                },
            })
            .collect();

        let mut seen = HashSet::new();
        let mut fields = Vec::new();
        for definition in definitions {
            for column in &definition.selected_columns {
                if !seen.insert(column.as_str()) {
                    continue;
                }

                let label = definition.column_label(column).unwrap_or(column.as_str());
                fields.push(json!({ "label": label, "value": column }));
            }
        }

        let entities = serde_json::to_value(entities).map_err(|error| {
            AppError::Internal(format!("failed to serialize data sources: {error}"))
        })?;

        let mut fragment = PayloadFragment::new();
        fragment.insert("entities".to_owned(), entities);
        fragment.insert("fields".to_owned(), Value::Array(fields));
        Ok(fragment)
    }
}

fn entity_options_query(entity: &str) -> PayloadFragment {
    let mut query = PayloadFragment::new();
    query.insert("entities".to_owned(), json!([{ "entity": entity }]));
    query.insert("fields".to_owned(), json!([{ "value": { "options": {} } }]));
    query
}
