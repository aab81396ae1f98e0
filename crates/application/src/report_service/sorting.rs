use std::sync::Arc;

use reportdef_core::{AppError, AppResult};
use reportdef_domain::{FieldOptions, SortClause, SortDefinition};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::options_state::LatestOptions;
use crate::report_ports::{FieldOptionsSource, PayloadFragment, merge_fragments};

/// Translates sort clauses to and from the `sort` payload.
pub struct SortTranslator {
    field_options: Arc<dyn FieldOptionsSource>,
    sort_options: LatestOptions<(), FieldOptions>,
}

impl SortTranslator {
    /// Creates a sort translator.
    #[must_use]
    pub fn new(field_options: Arc<dyn FieldOptionsSource>) -> Self {
        Self {
            field_options,
            sort_options: LatestOptions::default(),
        }
    }

    /// Fetches sortable values with one query covering every upstream fragment.
    pub async fn field_options_for_sorting(
        &self,
        entities: &PayloadFragment,
        parameters: &PayloadFragment,
        filters: &PayloadFragment,
        aggregates: &PayloadFragment,
    ) -> AppResult<FieldOptions> {
        let mut query = merge_fragments([entities, parameters, filters, aggregates]);
        query.insert(
            "sort".to_owned(),
            json!([{ "value": { "options": {} } }]),
        );

        let ticket = self.sort_options.ticket();
        let options = self.field_options.field_options(&query).await?;
        if !self.sort_options.publish((), ticket, options.clone()).await {
            debug!(ticket, "dropped stale sort field options");
        }

        Ok(options)
    }

    /// Returns the most recent sort options, if any were loaded.
    pub async fn latest_sort_options(&self) -> Option<FieldOptions> {
        self.sort_options.get(&()).await
    }

    /// Forgets the loaded sort options.
    pub async fn invalidate(&self) {
        self.sort_options.clear().await;
    }

    /// Decodes the backend `sort` array.
    pub fn sorting_definitions(sort: Option<&Value>) -> AppResult<Vec<SortDefinition>> {
        let Some(sort) = sort.filter(|value| !value.is_null()) else {
            return Ok(Vec::new());
        };

        let clauses = Vec::<SortClause>::deserialize(sort)
            .map_err(|error| AppError::Validation(format!("sort payload is invalid: {error}")))?;
        Ok(clauses.into_iter().map(SortDefinition::from).collect())
    }

    /// Builds the `sort` fragment.
    pub fn sorting_payload(definitions: &[SortDefinition]) -> AppResult<PayloadFragment> {
        let mut fragment = PayloadFragment::new();
        if definitions.is_empty() {
            return Ok(fragment);
        }

        let clauses: Vec<SortClause> = definitions.iter().map(SortClause::from).collect();
        let clauses = serde_json::to_value(clauses).map_err(|error| {
            AppError::Internal(format!("failed to serialize sort clauses: {error}"))
        })?;
        fragment.insert("sort".to_owned(), clauses);
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use reportdef_core::AppResult;
    use reportdef_domain::{FieldOptions, SortDirection};
    use serde_json::{Value, json};
    use tokio::sync::Mutex;

    use super::SortTranslator;
    use crate::report_ports::{FieldOptionsSource, PayloadFragment};

    #[derive(Default)]
    struct RecordingFieldOptions {
        queries: Mutex<Vec<PayloadFragment>>,
    }

    #[async_trait]
    impl FieldOptionsSource for RecordingFieldOptions {
        async fn field_options(&self, query: &PayloadFragment) -> AppResult<FieldOptions> {
            self.queries.lock().await.push(query.clone());
            Ok(FieldOptions::default())
        }
    }

    fn fragment(key: &str, value: Value) -> PayloadFragment {
        let mut fragment = PayloadFragment::new();
        fragment.insert(key.to_owned(), value);
        fragment
    }

    #[test]
    fn sort_rename_is_symmetric() {
        let sort = json!([{"value": "applications.name", "direction": "asc"}]);

        let definitions =
            SortTranslator::sorting_definitions(Some(&sort)).unwrap_or_else(|_| unreachable!());
        assert_eq!(definitions[0].sort_by, "applications.name");
        assert_eq!(definitions[0].direction, SortDirection::Asc);

        let payload =
            SortTranslator::sorting_payload(&definitions).unwrap_or_else(|_| unreachable!());
        assert_eq!(payload.get("sort"), Some(&sort));
    }

    #[test]
    fn unknown_direction_is_rejected() {
        let sort = json!([{"value": "applications.name", "direction": "sideways"}]);
        assert!(SortTranslator::sorting_definitions(Some(&sort)).is_err());
    }

    #[tokio::test]
    async fn sorting_options_merge_every_upstream_fragment() {
        let source = Arc::new(RecordingFieldOptions::default());
        let translator = SortTranslator::new(source.clone());

        let options = translator
            .field_options_for_sorting(
                &fragment("entities", json!([{"entity": "users"}])),
                &fragment("parameters", json!({})),
                &fragment("filter", json!({"is_null": "users.manager"})),
                &fragment("aggregate", json!({"fields": []})),
            )
            .await;
        assert!(options.is_ok());
        assert!(translator.latest_sort_options().await.is_some());

        let queries = source.queries.lock().await;
        assert_eq!(queries.len(), 1);
        let keys: Vec<&str> = queries[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["entities", "parameters", "filter", "aggregate", "sort"]);
    }
}
