use std::sync::Arc;

use reportdef_core::{AppError, AppResult};
use reportdef_domain::{AggregateDefinition, FieldOptions};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::options_state::LatestOptions;
use crate::report_ports::{FieldOptionsSource, PayloadFragment, merge_fragments};

#[derive(Deserialize)]
struct AggregatePayload {
    #[serde(default)]
    fields: Vec<AggregateField>,
}

#[derive(Deserialize)]
struct AggregateField {
    #[serde(default)]
    label: String,
    aggregate: Map<String, Value>,
}

/// Translates aggregate columns to and from the `aggregate` payload.
pub struct AggregateTranslator {
    field_options: Arc<dyn FieldOptionsSource>,
    aggregate_values: LatestOptions<String, FieldOptions>,
}

impl AggregateTranslator {
    /// Creates an aggregate translator.
    #[must_use]
    pub fn new(field_options: Arc<dyn FieldOptionsSource>) -> Self {
        Self {
            field_options,
            aggregate_values: LatestOptions::default(),
        }
    }

    /// Returns the values one aggregate function accepts.
    ///
    /// Results are kept per function so switching back to an already seen
    /// function does not query again.
    pub async fn field_options_for_aggregates(
        &self,
        function: &str,
        entities: &PayloadFragment,
        parameters: &PayloadFragment,
        filters: &PayloadFragment,
    ) -> AppResult<FieldOptions> {
        if let Some(options) = self.aggregate_values.get(&function.to_owned()).await {
            return Ok(options);
        }

        let mut query = merge_fragments([entities, parameters, filters]);
        query.insert(
            "aggregate".to_owned(),
            json!({
                "fields": [{ "label": "", "aggregate": { function: { "options": {} } } }]
            }),
        );

        let ticket = self.aggregate_values.ticket();
        let options = self.field_options.field_options(&query).await?;
        if !self
            .aggregate_values
            .publish(function.to_owned(), ticket, options.clone())
            .await
        {
            debug!(function, ticket, "dropped stale aggregate field options");
        }

        Ok(options)
    }

    /// Forgets every cached aggregate value list.
    pub async fn invalidate(&self) {
        self.aggregate_values.clear().await;
    }

    /// Decodes the backend `aggregate` object.
    pub fn aggregate_definitions(aggregate: Option<&Value>) -> AppResult<Vec<AggregateDefinition>> {
        let Some(aggregate) = aggregate.filter(|value| !value.is_null()) else {
            return Ok(Vec::new());
        };

        let payload = AggregatePayload::deserialize(aggregate).map_err(|error| {
            AppError::Validation(format!("aggregate payload is invalid: {error}"))
        })?;

        payload
            .fields
            .into_iter()
            .map(|field| {
                let mut entries = field.aggregate.into_iter();
                match (entries.next(), entries.next()) {
                    (Some((function, Value::String(value))), None) => Ok(AggregateDefinition {
                        label: field.label,
                        function,
                        value,
                    }),
                    _ => Err(AppError::Validation(format!(
                        "aggregate '{}' must map one function to one field path",
                        field.label
                    ))),
                }
            })
            .collect()
    }

    /// Builds the `aggregate` fragment.
    #[must_use]
    pub fn aggregates_payload(definitions: &[AggregateDefinition]) -> PayloadFragment {
        let mut fragment = PayloadFragment::new();
        if definitions.is_empty() {
            return fragment;
        }

        let fields: Vec<Value> = definitions
            .iter()
            .map(|definition| {
                json!({
                    "label": definition.label,
                    "aggregate": { definition.function.as_str(): definition.value },
                })
            })
            .collect();
        fragment.insert("aggregate".to_owned(), json!({ "fields": fields }));
        fragment
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use reportdef_core::AppResult;
    use reportdef_domain::{AggregateDefinition, FieldOptions};
    use serde_json::{Value, json};
    use tokio::sync::Mutex;

    use super::AggregateTranslator;
    use crate::report_ports::{FieldOptionsSource, PayloadFragment};

    #[derive(Default)]
    struct RecordingFieldOptions {
        queries: Mutex<Vec<PayloadFragment>>,
    }

    #[async_trait]
    impl FieldOptionsSource for RecordingFieldOptions {
        async fn field_options(&self, query: &PayloadFragment) -> AppResult<FieldOptions> {
            self.queries.lock().await.push(query.clone());
            Ok(serde_json::from_value(json!({
                "users.loginCount": {"class": "json", "type": "integer"}
            }))
            .unwrap_or_else(|_| unreachable!()))
        }
    }

    #[test]
    fn aggregates_payload_maps_function_to_value() {
        let payload = AggregateTranslator::aggregates_payload(&[AggregateDefinition {
            label: "agg1".to_owned(),
            function: "sum".to_owned(),
            value: "applications.name".to_owned(),
        }]);

        assert_eq!(
            Value::Object(payload),
            json!({"aggregate": {"fields": [{"label": "agg1", "aggregate": {"sum": "applications.name"}}]}})
        );
    }

    #[test]
    fn aggregate_definitions_read_the_single_function_entry() {
        let definitions = AggregateTranslator::aggregate_definitions(Some(&json!({
            "fields": [
                {"label": "logins", "aggregate": {"sum": "users.loginCount"}},
                {"label": "accounts", "aggregate": {"count": "users.userName"}}
            ]
        })))
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[1].function, "count");
        assert_eq!(definitions[1].value, "users.userName");

        let ambiguous = AggregateTranslator::aggregate_definitions(Some(&json!({
            "fields": [{"label": "x", "aggregate": {"sum": "a", "avg": "b"}}]
        })));
        assert!(ambiguous.is_err());
        assert!(
            AggregateTranslator::aggregate_definitions(None).is_ok_and(|list| list.is_empty())
        );
    }

    #[tokio::test]
    async fn field_options_are_fetched_once_per_function() {
        let source = Arc::new(RecordingFieldOptions::default());
        let translator = AggregateTranslator::new(source.clone());
        let entities = PayloadFragment::new();
        let parameters = PayloadFragment::new();
        let filters = PayloadFragment::new();

        for function in ["sum", "avg", "sum"] {
            let options = translator
                .field_options_for_aggregates(function, &entities, &parameters, &filters)
                .await;
            assert!(options.is_ok_and(|options| options.get("users.loginCount").is_some()));
        }

        let queries = source.queries.lock().await;
        assert_eq!(queries.len(), 2);
        assert_eq!(
            queries[1].get("aggregate"),
            Some(&json!({"fields": [{"label": "", "aggregate": {"avg": {"options": {}}}}]}))
        );
    }
}
