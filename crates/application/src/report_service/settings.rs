use reportdef_core::{AppError, AppResult};
use reportdef_domain::{
    AggregateDefinition, EntityDefinition, FilterGroup, ParameterDefinition, ReferenceRemoval,
    SortDefinition, prune_filter_definitions,
};
use serde::{Deserialize, Serialize};

use super::aggregates::AggregateTranslator;
use super::entities::EntityTranslator;
use super::filters::{FilterEncodeContext, FilterTranslator};
use super::parameters::ParameterTranslator;
use super::sorting::SortTranslator;
use crate::report_ports::{PayloadFragment, merge_fragments};

/// Report setting categories in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingId {
    /// Data sources and selected columns.
    Entities,
    /// Report parameters.
    Parameters,
    /// Filter tree.
    Filter,
    /// Aggregate columns.
    Aggregate,
    /// Sort clauses.
    Sort,
}

impl SettingId {
    /// Every category; later ones query field options with earlier fragments.
    pub const ORDERED: [Self; 5] = [
        Self::Entities,
        Self::Parameters,
        Self::Filter,
        Self::Aggregate,
        Self::Sort,
    ];

    /// Display title of the category.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Entities => "Data Sources",
            Self::Parameters => "Parameters",
            Self::Filter => "Filters",
            Self::Aggregate => "Aggregates",
            Self::Sort => "Sorting",
        }
    }

    fn position(self) -> usize {
        match self {
            Self::Entities => 0,
            Self::Parameters => 1,
            Self::Filter => 2,
            Self::Aggregate => 3,
            Self::Sort => 4,
        }
    }
}

/// Definitions of one category.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingDefinitions {
    /// Data source definitions.
    Entities(Vec<EntityDefinition>),
    /// Parameter definitions.
    Parameters(Vec<ParameterDefinition>),
    /// At most one top-level filter group.
    Filter(Vec<FilterGroup>),
    /// Aggregate definitions.
    Aggregate(Vec<AggregateDefinition>),
    /// Sort definitions.
    Sort(Vec<SortDefinition>),
}

impl SettingDefinitions {
    /// Empty definitions of a category.
    #[must_use]
    pub fn empty(id: SettingId) -> Self {
        match id {
            SettingId::Entities => Self::Entities(Vec::new()),
            SettingId::Parameters => Self::Parameters(Vec::new()),
            SettingId::Filter => Self::Filter(Vec::new()),
            SettingId::Aggregate => Self::Aggregate(Vec::new()),
            SettingId::Sort => Self::Sort(Vec::new()),
        }
    }

    /// Category of the definitions.
    #[must_use]
    pub fn id(&self) -> SettingId {
        match self {
            Self::Entities(_) => SettingId::Entities,
            Self::Parameters(_) => SettingId::Parameters,
            Self::Filter(_) => SettingId::Filter,
            Self::Aggregate(_) => SettingId::Aggregate,
            Self::Sort(_) => SettingId::Sort,
        }
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Entities(definitions) => definitions.len(),
            Self::Parameters(definitions) => definitions.len(),
            Self::Filter(definitions) => definitions.len(),
            Self::Aggregate(definitions) => definitions.len(),
            Self::Sort(definitions) => definitions.len(),
        }
    }

    /// Returns whether the category holds no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds the backend fragment of the category; empty categories yield `{}`.
    pub fn payload(&self, context: &FilterEncodeContext<'_>) -> AppResult<PayloadFragment> {
        if self.is_empty() {
            return Ok(PayloadFragment::new());
        }

        match self {
            Self::Entities(definitions) => EntityTranslator::entities_payload(definitions),
            Self::Parameters(definitions) => ParameterTranslator::parameters_payload(definitions),
            Self::Filter(definitions) => FilterTranslator::filters_payload(definitions, context),
            Self::Aggregate(definitions) => {
                Ok(AggregateTranslator::aggregates_payload(definitions))
            }
            Self::Sort(definitions) => SortTranslator::sorting_payload(definitions),
        }
    }
}

/// One titled category of a report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSetting {
    id: SettingId,
    definitions: SettingDefinitions,
}

impl ReportSetting {
    /// Category id.
    #[must_use]
    pub fn id(&self) -> SettingId {
        self.id
    }

    /// Display title.
    #[must_use]
    pub fn title(&self) -> &'static str {
        self.id.title()
    }

    /// Current definitions.
    #[must_use]
    pub fn definitions(&self) -> &SettingDefinitions {
        &self.definitions
    }
}

/// Serializable form of [`ReportSettings`], one array per category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSettingsDocument {
    /// Data source definitions.
    #[serde(default)]
    pub entities: Vec<EntityDefinition>,
    /// Parameter definitions.
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
    /// Filter groups.
    #[serde(default)]
    pub filter: Vec<FilterGroup>,
    /// Aggregate definitions.
    #[serde(default)]
    pub aggregate: Vec<AggregateDefinition>,
    /// Sort definitions.
    #[serde(default)]
    pub sort: Vec<SortDefinition>,
}

/// The five report categories in fixed order.
///
/// Every mutation returns a new value and leaves the receiver untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    settings: [ReportSetting; 5],
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            settings: SettingId::ORDERED.map(|id| ReportSetting {
                id,
                definitions: SettingDefinitions::empty(id),
            }),
        }
    }
}

impl ReportSettings {
    /// Creates settings with every category empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Categories in fixed order.
    #[must_use]
    pub fn settings(&self) -> &[ReportSetting] {
        &self.settings
    }

    /// Definitions of one category.
    #[must_use]
    pub fn definitions(&self, id: SettingId) -> &SettingDefinitions {
        &self.settings[id.position()].definitions
    }

    /// Data source definitions.
    #[must_use]
    pub fn entities(&self) -> &[EntityDefinition] {
        match self.definitions(SettingId::Entities) {
            SettingDefinitions::Entities(definitions) => definitions,
            _ => &[],
        }
    }

    /// Parameter definitions.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterDefinition] {
        match self.definitions(SettingId::Parameters) {
            SettingDefinitions::Parameters(definitions) => definitions,
            _ => &[],
        }
    }

    /// Filter groups.
    #[must_use]
    pub fn filters(&self) -> &[FilterGroup] {
        match self.definitions(SettingId::Filter) {
            SettingDefinitions::Filter(definitions) => definitions,
            _ => &[],
        }
    }

    /// Aggregate definitions.
    #[must_use]
    pub fn aggregates(&self) -> &[AggregateDefinition] {
        match self.definitions(SettingId::Aggregate) {
            SettingDefinitions::Aggregate(definitions) => definitions,
            _ => &[],
        }
    }

    /// Sort definitions.
    #[must_use]
    pub fn sorts(&self) -> &[SortDefinition] {
        match self.definitions(SettingId::Sort) {
            SettingDefinitions::Sort(definitions) => definitions,
            _ => &[],
        }
    }

    /// Returns new settings with one category replaced.
    #[must_use]
    pub fn generate_new_settings(&self, definitions: SettingDefinitions) -> Self {
        let mut next = self.clone();
        let position = definitions.id().position();
        next.settings[position].definitions = definitions;
        next
    }

    /// Builds the fragment of one category.
    pub fn fragment(
        &self,
        id: SettingId,
        context: &FilterEncodeContext<'_>,
    ) -> AppResult<PayloadFragment> {
        self.definitions(id).payload(context)
    }

    /// Shallow-merges every non-empty category fragment in category order.
    pub fn report_payload(&self, context: &FilterEncodeContext<'_>) -> AppResult<PayloadFragment> {
        let fragments = self
            .settings
            .iter()
            .filter(|setting| !setting.definitions.is_empty())
            .map(|setting| setting.definitions.payload(context))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(merge_fragments(&fragments))
    }

    /// Drops filter rules, aggregates and sorts that reference a removed
    /// data source or parameter.
    ///
    /// Sorts on the alias of a dropped aggregate are dropped as well.
    #[must_use]
    pub fn remove_references(&self, removal: &ReferenceRemoval) -> Self {
        let filters = prune_filter_definitions(self.filters(), removal);

        let (aggregates, dropped): (Vec<_>, Vec<_>) = self
            .aggregates()
            .iter()
            .cloned()
            .partition(|aggregate| !removal.matches(&aggregate.value));

        let sorts = self
            .sorts()
            .iter()
            .filter(|sort| {
                !removal.matches(&sort.sort_by)
                    && !dropped.iter().any(|aggregate| aggregate.label == sort.sort_by)
            })
            .cloned()
            .collect();

        self.generate_new_settings(SettingDefinitions::Filter(filters))
            .generate_new_settings(SettingDefinitions::Aggregate(aggregates))
            .generate_new_settings(SettingDefinitions::Sort(sorts))
    }

    /// Deletes a data source and prunes everything that referenced it.
    pub fn delete_entity(&self, index: usize) -> AppResult<Self> {
        let entity = self
            .entities()
            .get(index)
            .map(|definition| definition.data_source.clone())
            .ok_or_else(|| AppError::Validation(format!("no data source at position {index}")))?;

        let entities = generate_new_definitions(self.entities(), Some(index), None);
        Ok(self
            .generate_new_settings(SettingDefinitions::Entities(entities))
            .remove_references(&ReferenceRemoval::Entity(entity)))
    }

    /// Deletes a parameter and prunes everything that referenced it.
    pub fn delete_parameter(&self, index: usize) -> AppResult<Self> {
        let parameter = self
            .parameters()
            .get(index)
            .map(|definition| definition.parameter_name.clone())
            .ok_or_else(|| AppError::Validation(format!("no parameter at position {index}")))?;

        let parameters = generate_new_definitions(self.parameters(), Some(index), None);
        Ok(self
            .generate_new_settings(SettingDefinitions::Parameters(parameters))
            .remove_references(&ReferenceRemoval::Parameter(parameter)))
    }

    /// Copies the settings into their serializable form.
    #[must_use]
    pub fn to_document(&self) -> ReportSettingsDocument {
        ReportSettingsDocument {
            entities: self.entities().to_vec(),
            parameters: self.parameters().to_vec(),
            filter: self.filters().to_vec(),
            aggregate: self.aggregates().to_vec(),
            sort: self.sorts().to_vec(),
        }
    }

    /// Builds settings from their serializable form.
    #[must_use]
    pub fn from_document(document: ReportSettingsDocument) -> Self {
        Self::new()
            .generate_new_settings(SettingDefinitions::Entities(document.entities))
            .generate_new_settings(SettingDefinitions::Parameters(document.parameters))
            .generate_new_settings(SettingDefinitions::Filter(document.filter))
            .generate_new_settings(SettingDefinitions::Aggregate(document.aggregate))
            .generate_new_settings(SettingDefinitions::Sort(document.sort))
    }
}

/// Returns a copy of `existing` with one definition replaced, appended or removed.
///
/// A definition with a valid index replaces that position, a definition
/// without one is appended, and a valid index without a definition deletes.
#[must_use]
pub fn generate_new_definitions<T: Clone>(
    existing: &[T],
    index: Option<usize>,
    new_definition: Option<T>,
) -> Vec<T> {
    let mut definitions = existing.to_vec();
    match (index.filter(|index| *index < definitions.len()), new_definition) {
        (Some(index), Some(definition)) => definitions[index] = definition,
        (None, Some(definition)) => definitions.push(definition),
        (Some(index), None) => {
            definitions.remove(index);
        }
        (None, None) => {}
    }
    definitions
}
