//! Application services and ports for compiling report definitions.

#![forbid(unsafe_code)]

mod aggregate_catalog;
mod operator_catalog;
mod report_ports;
mod report_service;

pub use aggregate_catalog::AggregateCatalog;
pub use operator_catalog::OperatorCatalog;
pub use report_ports::{
    FieldOptionsSource, PayloadFragment, ReportCatalogSource, ReportTemplateRepository,
    merge_fragments,
};
pub use report_service::{
    AggregateTranslator, EntityTranslator, FilterEncodeContext, FilterTranslator,
    ParameterTranslator, ParameterTypeCatalogs, ReportDefinitionService, ReportSetting,
    ReportSettings, ReportSettingsDocument, SettingDefinitions, SettingId, SortTranslator,
    generate_new_definitions,
};
