use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use reportdef_core::{AppError, AppResult};
use reportdef_domain::{
    EntityDefinition, EntityRef, FieldOptions, OperatorKeyTable, ParameterDefinition,
    ReportTemplate,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::aggregate_catalog::AggregateCatalog;
use crate::operator_catalog::OperatorCatalog;
use crate::report_ports::{
    FieldOptionsSource, PayloadFragment, ReportCatalogSource, ReportTemplateRepository,
};

mod aggregates;
mod entities;
mod filters;
mod options_state;
mod parameters;
mod settings;
mod sorting;


pub use aggregates::AggregateTranslator;
pub use entities::EntityTranslator;
pub use filters::{FilterEncodeContext, FilterTranslator};
pub use parameters::{ParameterTranslator, ParameterTypeCatalogs};
pub use settings::{
    ReportSetting, ReportSettings, ReportSettingsDocument, SettingDefinitions, SettingId,
    generate_new_definitions,
};
pub use sorting::SortTranslator;

#[derive(Deserialize)]
struct SelectedField {
    value: String,
}

/// Fragments a category's field options query depends on.
struct UpstreamFragments {
    entities: PayloadFragment,
    parameters: PayloadFragment,
    filter: PayloadFragment,
}

/// Compiles report settings into backend queries and back.
#[derive(Clone)]
pub struct ReportDefinitionService {
    operator_catalog: Arc<OperatorCatalog>,
    aggregate_catalog: Arc<AggregateCatalog>,
    entity_translator: Arc<EntityTranslator>,
    parameter_translator: Arc<ParameterTranslator>,
    filter_translator: Arc<FilterTranslator>,
    aggregate_translator: Arc<AggregateTranslator>,
    sort_translator: Arc<SortTranslator>,
    template_repository: Option<Arc<dyn ReportTemplateRepository>>,
}

impl ReportDefinitionService {
    /// Creates a service with fresh catalogs and option caches.
    #[must_use]
    pub fn new(
        field_options: Arc<dyn FieldOptionsSource>,
        catalog_source: Arc<dyn ReportCatalogSource>,
    ) -> Self {
        let operator_catalog = Arc::new(OperatorCatalog::new(catalog_source.clone()));

        Self {
            aggregate_catalog: Arc::new(AggregateCatalog::new(catalog_source.clone())),
            entity_translator: Arc::new(EntityTranslator::new(field_options.clone())),
            parameter_translator: Arc::new(ParameterTranslator::new(catalog_source)),
            filter_translator: Arc::new(FilterTranslator::new(
                field_options.clone(),
                operator_catalog.clone(),
            )),
            aggregate_translator: Arc::new(AggregateTranslator::new(field_options.clone())),
            sort_translator: Arc::new(SortTranslator::new(field_options)),
            operator_catalog,
            template_repository: None,
        }
    }

    /// Enables saving templates.
    #[must_use]
    pub fn with_template_repository(
        mut self,
        template_repository: Arc<dyn ReportTemplateRepository>,
    ) -> Self {
        self.template_repository = Some(template_repository);
        self
    }

    /// Filter operator catalog.
    #[must_use]
    pub fn operator_catalog(&self) -> &OperatorCatalog {
        &self.operator_catalog
    }

    /// Aggregate function catalog.
    #[must_use]
    pub fn aggregate_catalog(&self) -> &AggregateCatalog {
        &self.aggregate_catalog
    }

    /// Data source translator.
    #[must_use]
    pub fn entity_translator(&self) -> &EntityTranslator {
        &self.entity_translator
    }

    /// Parameter translator and its type catalogs.
    #[must_use]
    pub fn parameter_translator(&self) -> &ParameterTranslator {
        &self.parameter_translator
    }

    /// Filter translator.
    #[must_use]
    pub fn filter_translator(&self) -> &FilterTranslator {
        &self.filter_translator
    }

    /// Aggregate translator.
    #[must_use]
    pub fn aggregate_translator(&self) -> &AggregateTranslator {
        &self.aggregate_translator
    }

    /// Sort translator.
    #[must_use]
    pub fn sort_translator(&self) -> &SortTranslator {
        &self.sort_translator
    }

    /// Decomposes a saved backend query into report settings.
    ///
    /// Data source columns are resolved first; every later category is
    /// decoded against the fragments of the categories before it.
    pub async fn settings_from_payload(&self, payload: &Value) -> AppResult<ReportSettings> {
        let Value::Object(payload) = payload else {
            return Err(AppError::Validation(
                "report payload must be a JSON object".to_owned(),
            ));
        };

        let entity_refs: Vec<EntityRef> = decode_optional(payload, "entities")?;
        let selected_fields: Vec<SelectedField> = decode_optional(payload, "fields")?;
        let mut entities = self
            .entity_translator
            .entity_definitions(&entity_refs)
            .await?;
        restore_selected_columns(&mut entities, &selected_fields);

        let parameters = match payload.get("parameters") {
            Some(Value::Object(parameters)) => {
                ParameterTranslator::parameter_definitions(parameters)?
            }
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(AppError::Validation(
                    "report parameters must be a JSON object".to_owned(),
                ));
            }
        };

        let filters = self
            .filter_translator
            .filter_definitions(
                payload.get("filter"),
                &entities_fragment(&entities)?,
                &parameters_fragment(&parameters)?,
            )
            .await?;
        let aggregates = AggregateTranslator::aggregate_definitions(payload.get("aggregate"))?;
        let sorts = SortTranslator::sorting_definitions(payload.get("sort"))?;

        Ok(ReportSettings::from_document(ReportSettingsDocument {
            entities,
            parameters,
            filter: filters,
            aggregate: aggregates,
            sort: sorts,
        }))
    }

    /// Compiles settings into the merged backend query.
    ///
    /// The operator catalog and per-operator field options are only loaded
    /// when the report has filters.
    pub async fn report_payload(&self, settings: &ReportSettings) -> AppResult<PayloadFragment> {
        let (key_table, operator_options) = self.filter_encoding(settings).await?;
        settings.report_payload(&FilterEncodeContext::new(&key_table, &operator_options))
    }

    /// Fetches the operands selectable for a filter operator.
    pub async fn filter_field_options(
        &self,
        settings: &ReportSettings,
        operator: &str,
    ) -> AppResult<FieldOptions> {
        self.filter_translator
            .field_options_for_filters(
                &entities_fragment(settings.entities())?,
                &parameters_fragment(settings.parameters())?,
                operator,
            )
            .await
    }

    /// Fetches the values an aggregate function accepts.
    pub async fn aggregate_field_options(
        &self,
        settings: &ReportSettings,
        function: &str,
    ) -> AppResult<FieldOptions> {
        let upstream = self.upstream_fragments(settings).await?;
        self.aggregate_translator
            .field_options_for_aggregates(
                function,
                &upstream.entities,
                &upstream.parameters,
                &upstream.filter,
            )
            .await
    }

    /// Fetches sortable values for every column, parameter, filter field and aggregate alias.
    pub async fn sort_field_options(&self, settings: &ReportSettings) -> AppResult<FieldOptions> {
        let upstream = self.upstream_fragments(settings).await?;
        let aggregates = AggregateTranslator::aggregates_payload(settings.aggregates());
        self.sort_translator
            .field_options_for_sorting(
                &upstream.entities,
                &upstream.parameters,
                &upstream.filter,
                &aggregates,
            )
            .await
    }

    /// Compiles the settings and stores them as a draft template.
    pub async fn save_draft_template(
        &self,
        name: &str,
        description: &str,
        viewers: Vec<String>,
        settings: &ReportSettings,
    ) -> AppResult<Value> {
        let repository = self.template_repository.as_ref().ok_or_else(|| {
            AppError::Internal("report template repository is not configured".to_owned())
        })?;

        let payload = self.report_payload(settings).await?;
        let report_config = serde_json::to_string(&payload).map_err(|error| {
            AppError::Internal(format!("failed to serialize report payload: {error}"))
        })?;
        let template = ReportTemplate::new(name, description, viewers, report_config)?;

        info!(template = template.name().as_str(), "saving draft report template");
        repository.create_draft_template(template).await
    }

    /// Forgets filter, aggregate and sort field options.
    pub async fn invalidate_field_options(&self) {
        self.filter_translator.invalidate().await;
        self.aggregate_translator.invalidate().await;
        self.sort_translator.invalidate().await;
    }

    /// Forgets every catalog and field option cache, as on a new editing session.
    pub async fn reset_session(&self) {
        self.operator_catalog.invalidate().await;
        self.aggregate_catalog.invalidate().await;
        self.parameter_translator.invalidate().await;
        self.invalidate_field_options().await;
    }

    async fn filter_encoding(
        &self,
        settings: &ReportSettings,
    ) -> AppResult<(Arc<OperatorKeyTable>, HashMap<String, FieldOptions>)> {
        let operators: BTreeSet<String> = settings
            .filters()
            .iter()
            .flat_map(|group| group.rule_operators())
            .collect();
        if operators.is_empty() {
            return Ok((Arc::new(OperatorKeyTable::default()), HashMap::new()));
        }

        let key_table = self.operator_catalog.key_table().await?;
        let entities = entities_fragment(settings.entities())?;
        let parameters = parameters_fragment(settings.parameters())?;
        let mut operator_options = HashMap::with_capacity(operators.len());
        for operator in operators {
            let options = self
                .filter_translator
                .resolved_field_options(&entities, &parameters, &operator)
                .await?;
            operator_options.insert(operator, options);
        }

        Ok((key_table, operator_options))
    }

    async fn upstream_fragments(&self, settings: &ReportSettings) -> AppResult<UpstreamFragments> {
        let (key_table, operator_options) = self.filter_encoding(settings).await?;
        let context = FilterEncodeContext::new(&key_table, &operator_options);

        Ok(UpstreamFragments {
            entities: entities_fragment(settings.entities())?,
            parameters: parameters_fragment(settings.parameters())?,
            filter: settings.fragment(SettingId::Filter, &context)?,
        })
    }
}

fn entities_fragment(definitions: &[EntityDefinition]) -> AppResult<PayloadFragment> {
    if definitions.is_empty() {
        return Ok(PayloadFragment::new());
    }
    EntityTranslator::entities_payload(definitions)
}

fn parameters_fragment(definitions: &[ParameterDefinition]) -> AppResult<PayloadFragment> {
    if definitions.is_empty() {
        return Ok(PayloadFragment::new());
    }
    ParameterTranslator::parameters_payload(definitions)
}

fn decode_optional<T: serde::de::DeserializeOwned>(
    payload: &Map<String, Value>,
    key: &str,
) -> AppResult<Vec<T>> {
    match payload.get(key) {
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(value) => Vec::<T>::deserialize(value).map_err(|error| {
            AppError::Validation(format!("report {key} are invalid: {error}"))
        }),
    }
}

/// Places every selected field on the data source that owns it.
fn restore_selected_columns(entities: &mut [EntityDefinition], fields: &[SelectedField]) {
    for field in fields {
        let path = field.value.as_str();
        let owner = entities
            .iter()
            .position(|definition| definition.has_column(path))
            .or_else(|| {
                entities.iter().position(|definition| {
                    path.strip_prefix(definition.data_source.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
                })
            });

        match owner.and_then(|position| entities.get_mut(position)) {
            Some(definition) => {
                if !definition.selected_columns.iter().any(|column| column == path) {
                    definition.selected_columns.push(path.to_owned());
                }
            }
            None => warn!(field = path, "selected field matches no data source"),
        }
    }
}
