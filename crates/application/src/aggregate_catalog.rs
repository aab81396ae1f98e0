use std::sync::Arc;

use reportdef_core::{AppError, AppResult};
use reportdef_domain::AggregateFunction;
use tokio::sync::RwLock;
use tracing::debug;

use crate::report_ports::ReportCatalogSource;

/// Session cache of aggregate functions.
pub struct AggregateCatalog {
    source: Arc<dyn ReportCatalogSource>,
    cached: RwLock<Option<Arc<[AggregateFunction]>>>,
}

impl AggregateCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new(source: Arc<dyn ReportCatalogSource>) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// Returns every supported aggregate function.
    pub async fn fetch_aggregate_functions(&self) -> AppResult<Vec<AggregateFunction>> {
        Ok(self.load().await?.to_vec())
    }

    /// Returns one aggregate function by name.
    pub async fn function_by_name(&self, name: &str) -> AppResult<AggregateFunction> {
        self.load()
            .await?
            .iter()
            .find(|function| function.name == name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("unknown aggregate function '{name}'")))
    }

    /// Drops the cached catalog.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    async fn load(&self) -> AppResult<Arc<[AggregateFunction]>> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            return Ok(cached.clone());
        }

        let functions: Arc<[AggregateFunction]> =
            self.source.list_aggregate_functions().await?.into();
        debug!(function_count = functions.len(), "aggregate catalog loaded");

        let mut cached = self.cached.write().await;
        Ok(cached.get_or_insert(functions).clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use reportdef_core::{AppError, AppResult};
    use reportdef_domain::{AggregateFunction, OperatorSchema, ParameterSource, ParameterTypeDecl};
    use serde_json::json;

    use super::AggregateCatalog;
    use crate::report_ports::ReportCatalogSource;

    #[derive(Default)]
    struct AggregateSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReportCatalogSource for AggregateSource {
        async fn list_operators(&self) -> AppResult<Vec<OperatorSchema>> {
            Ok(Vec::new())
        }

        async fn list_aggregate_functions(&self) -> AppResult<Vec<AggregateFunction>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![AggregateFunction {
                name: "sum".to_owned(),
                display_name: "Sum".to_owned(),
                schema: json!({"options": {"type": ["integer", "number"]}}),
            }])
        }

        async fn list_parameter_types(
            &self,
            _source: ParameterSource,
        ) -> AppResult<Vec<ParameterTypeDecl>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn aggregate_functions_are_cached_until_invalidated() {
        let source = Arc::new(AggregateSource::default());
        let catalog = AggregateCatalog::new(source.clone());

        assert!(catalog.fetch_aggregate_functions().await.is_ok_and(|list| list.len() == 1));
        assert!(catalog.function_by_name("sum").await.is_ok());
        assert!(matches!(
            catalog.function_by_name("median").await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        catalog.invalidate().await;
        assert!(catalog.fetch_aggregate_functions().await.is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
