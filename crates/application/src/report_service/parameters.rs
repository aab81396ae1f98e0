use std::sync::Arc;

use reportdef_core::{AppError, AppResult};
use reportdef_domain::{
    FieldItem, ParameterDeclaration, ParameterDefinition, ParameterSource, ParameterTypeDecl,
};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::report_ports::{PayloadFragment, ReportCatalogSource};

/// Basic and datasource parameter type catalogs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterTypeCatalogs {
    /// Basic input types.
    pub basic: Vec<ParameterTypeDecl>,
    /// Managed object attribute backed types.
    pub datasource: Vec<ParameterTypeDecl>,
}

impl ParameterTypeCatalogs {
    fn is_empty(&self) -> bool {
        self.basic.is_empty() && self.datasource.is_empty()
    }
}

/// Translates parameter definitions to and from the `parameters` payload.
pub struct ParameterTranslator {
    source: Arc<dyn ReportCatalogSource>,
    catalogs: RwLock<ParameterTypeCatalogs>,
}

impl ParameterTranslator {
    /// Creates a parameter translator with empty catalogs.
    #[must_use]
    pub fn new(source: Arc<dyn ReportCatalogSource>) -> Self {
        Self {
            source,
            catalogs: RwLock::new(ParameterTypeCatalogs::default()),
        }
    }

    /// Returns both parameter type catalogs, fetching them concurrently while both are empty.
    pub async fn fetch_parameters_data(&self) -> AppResult<ParameterTypeCatalogs> {
        {
            let catalogs = self.catalogs.read().await;
            if !catalogs.is_empty() {
                return Ok(catalogs.clone());
            }
        }

        let (basic, datasource) = tokio::try_join!(
            self.source.list_parameter_types(ParameterSource::Basic),
            self.source.list_parameter_types(ParameterSource::Datasource),
        )?;
        debug!(
            basic_count = basic.len(),
            datasource_count = datasource.len(),
            "parameter type catalogs loaded"
        );

        let fetched = ParameterTypeCatalogs { basic, datasource };
        *self.catalogs.write().await = fetched.clone();
        Ok(fetched)
    }

    /// Empties both catalogs so the next request fetches again.
    pub async fn invalidate(&self) {
        *self.catalogs.write().await = ParameterTypeCatalogs::default();
    }

    /// Converts the backend `parameters` object into UI definitions.
    pub fn parameter_definitions(
        parameters: &Map<String, Value>,
    ) -> AppResult<Vec<ParameterDefinition>> {
        parameters
            .iter()
            .map(|(name, declaration)| {
                let declaration: ParameterDeclaration =
                    serde_json::from_value(declaration.clone()).map_err(|error| {
                        AppError::Validation(format!(
                            "invalid declaration for parameter '{name}': {error}"
                        ))
                    })?;
                Ok(Self::parameter_definition(name, declaration))
            })
            .collect()
    }

    fn parameter_definition(name: &str, declaration: ParameterDeclaration) -> ParameterDefinition {
        let (input_type, multivalued) = match declaration.item {
            Some(item) if declaration.parameter_type == "array" => (item.item_type, true),
            _ => (declaration.parameter_type, false),
        };
        let is_datasource = declaration.source == ParameterSource::Datasource;

        ParameterDefinition {
            parameter_name: name.to_owned(),
            input_label: declaration.label,
            help_text: declaration.description,
            input_type,
            multivalued,
            source: declaration.source,
            data_source: declaration.entity.filter(|_| is_datasource),
            data_source_property: declaration.attribute.filter(|_| is_datasource),
            enumerated_values: declaration.enumerated_values.unwrap_or_default(),
        }
    }

    /// Builds the `parameters` fragment.
    ///
    /// `enum` is only sent for string parameters with enumerated values.
    pub fn parameters_payload(definitions: &[ParameterDefinition]) -> AppResult<PayloadFragment> {
        let parameters = definitions
            .iter()
            .map(|definition| {
                let declaration = serde_json::to_value(Self::parameter_declaration(definition))
                    .map_err(|error| {
                        AppError::Internal(format!(
                            "failed to serialize parameter '{}': {error}",
                            definition.parameter_name
                        ))
                    })?;
                Ok((definition.parameter_name.clone(), declaration))
            })
            .collect::<AppResult<Map<String, Value>>>()?;

        let mut fragment = PayloadFragment::new();
        fragment.insert("parameters".to_owned(), Value::Object(parameters));
        Ok(fragment)
    }

    fn parameter_declaration(definition: &ParameterDefinition) -> ParameterDeclaration {
        let (parameter_type, item) = if definition.multivalued {
            (
                "array".to_owned(),
                Some(FieldItem {
                    item_type: definition.input_type.clone(),
                }),
            )
        } else {
            (definition.input_type.clone(), None)
        };
        let is_datasource = definition.source == ParameterSource::Datasource;
        let sends_enum = !definition.enumerated_values.is_empty()
            && definition.input_type.eq_ignore_ascii_case("string");

        ParameterDeclaration {
            label: definition.input_label.clone(),
            description: definition.help_text.clone(),
            parameter_type,
            item,
            source: definition.source,
            entity: definition.data_source.clone().filter(|_| is_datasource),
            attribute: definition
                .data_source_property
                .clone()
                .filter(|_| is_datasource),
            enumerated_values: sends_enum.then(|| definition.enumerated_values.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use reportdef_core::AppResult;
    use reportdef_domain::{
        AggregateFunction, EnumeratedValue, OperatorSchema, ParameterDefinition, ParameterSource,
        ParameterTypeDecl,
    };
    use serde_json::json;

    use super::ParameterTranslator;
    use crate::report_ports::ReportCatalogSource;

    fn enumerated_definition(input_type: &str) -> ParameterDefinition {
        ParameterDefinition {
            parameter_name: "status".to_owned(),
            input_label: "Status".to_owned(),
            help_text: String::new(),
            input_type: input_type.to_owned(),
            multivalued: false,
            source: ParameterSource::Basic,
            data_source: None,
            data_source_property: None,
            enumerated_values: vec![EnumeratedValue {
                name: "Active".to_owned(),
                value: "active".to_owned(),
            }],
        }
    }

    #[test]
    fn enum_is_only_sent_for_string_inputs() {
        let string_payload =
            ParameterTranslator::parameters_payload(&[enumerated_definition("String")])
                .unwrap_or_else(|_| unreachable!());
        assert_eq!(
            string_payload.get("parameters"),
            Some(&json!({
                "status": {
                    "label": "Status",
                    "description": "",
                    "type": "String",
                    "source": "basic",
                    "enum": [{"name": "Active", "value": "active"}]
                }
            }))
        );

        let int_payload = ParameterTranslator::parameters_payload(&[enumerated_definition("int")])
            .unwrap_or_else(|_| unreachable!());
        let declaration = int_payload
            .get("parameters")
            .and_then(|parameters| parameters.get("status"))
            .unwrap_or_else(|| unreachable!());
        assert!(declaration.get("enum").is_none());
    }

    #[test]
    fn multivalued_datasource_parameters_translate_both_ways() {
        let parameters = json!({
            "owners": {
                "label": "Owners",
                "description": "Application owners",
                "type": "array",
                "item": {"type": "string"},
                "source": "datasource",
                "entity": "managed/user",
                "attribute": "userName"
            },
            "since": {
                "label": "Since",
                "description": "",
                "type": "date",
                "source": "basic",
                "entity": "ignored"
            }
        });

        let definitions = ParameterTranslator::parameter_definitions(
            parameters.as_object().unwrap_or_else(|| unreachable!()),
        )
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(definitions[0].input_type, "string");
        assert!(definitions[0].multivalued);
        assert_eq!(definitions[0].data_source.as_deref(), Some("managed/user"));
        assert_eq!(definitions[0].data_source_property.as_deref(), Some("userName"));
        assert_eq!(definitions[1].data_source, None);

        let payload = ParameterTranslator::parameters_payload(&definitions)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(
            payload.get("parameters").and_then(|value| value.get("owners")),
            parameters.get("owners")
        );
        assert_eq!(
            payload
                .get("parameters")
                .and_then(|value| value.get("since"))
                .and_then(|value| value.get("entity")),
            None
        );
    }

    #[derive(Default)]
    struct CountingParameterTypes {
        calls: AtomicUsize,
        empty: bool,
    }

    #[async_trait]
    impl ReportCatalogSource for CountingParameterTypes {
        async fn list_operators(&self) -> AppResult<Vec<OperatorSchema>> {
            Ok(Vec::new())
        }

        async fn list_aggregate_functions(&self) -> AppResult<Vec<AggregateFunction>> {
            Ok(Vec::new())
        }

        async fn list_parameter_types(
            &self,
            source: ParameterSource,
        ) -> AppResult<Vec<ParameterTypeDecl>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.empty {
                return Ok(Vec::new());
            }

            let name = match source {
                ParameterSource::Basic => "string",
                ParameterSource::Datasource => "managed/user",
            };
            Ok(vec![ParameterTypeDecl {
                name: name.to_owned(),
                display_name: None,
                attributes: Vec::new(),
            }])
        }
    }

    #[tokio::test]
    async fn catalogs_are_cached_once_loaded() {
        let source = Arc::new(CountingParameterTypes::default());
        let translator = ParameterTranslator::new(source.clone());

        let first = translator.fetch_parameters_data().await;
        let second = translator.fetch_parameters_data().await;

        assert!(matches!(first, Ok(ref catalogs) if catalogs.datasource[0].name == "managed/user"));
        assert!(second.is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_catalogs_are_fetched_again() {
        let source = Arc::new(CountingParameterTypes {
            calls: AtomicUsize::new(0),
            empty: true,
        });
        let translator = ParameterTranslator::new(source.clone());

        assert!(translator.fetch_parameters_data().await.is_ok());
        assert!(translator.fetch_parameters_data().await.is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }
}
