use async_trait::async_trait;
use reportdef_core::AppResult;
use reportdef_domain::{AggregateFunction, OperatorSchema, ParameterSource, ParameterTypeDecl};

/// Port for the operator, aggregate and parameter type catalogs.
#[async_trait]
pub trait ReportCatalogSource: Send + Sync {
    /// Lists supported filter operators.
    async fn list_operators(&self) -> AppResult<Vec<OperatorSchema>>;

    /// Lists supported aggregate functions.
    async fn list_aggregate_functions(&self) -> AppResult<Vec<AggregateFunction>>;

    /// Lists parameter types available for one value source.
    async fn list_parameter_types(&self, source: ParameterSource)
    -> AppResult<Vec<ParameterTypeDecl>>;
}
