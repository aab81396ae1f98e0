use std::sync::Arc;

use reportdef_core::{AppError, AppResult};
use reportdef_domain::{OperatorKeyTable, OperatorSchema};
use tokio::sync::RwLock;
use tracing::debug;

use crate::report_ports::ReportCatalogSource;

struct CachedOperators {
    schemas: Vec<OperatorSchema>,
    key_table: Arc<OperatorKeyTable>,
}

/// Session cache of filter operators and their derived key table.
///
/// Filled by the first successful fetch and kept until [`OperatorCatalog::invalidate`].
/// Failed fetches are not cached and not retried.
pub struct OperatorCatalog {
    source: Arc<dyn ReportCatalogSource>,
    cached: RwLock<Option<Arc<CachedOperators>>>,
}

impl OperatorCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new(source: Arc<dyn ReportCatalogSource>) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// Returns every supported operator.
    pub async fn fetch_operators(&self) -> AppResult<Vec<OperatorSchema>> {
        Ok(self.load().await?.schemas.clone())
    }

    /// Returns one operator by name.
    pub async fn operator_by_name(&self, name: &str) -> AppResult<OperatorSchema> {
        self.load()
            .await?
            .schemas
            .iter()
            .find(|schema| schema.name == name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("unknown filter operator '{name}'")))
    }

    /// Returns the operand key table derived from the catalog.
    pub async fn key_table(&self) -> AppResult<Arc<OperatorKeyTable>> {
        Ok(self.load().await?.key_table.clone())
    }

    /// Drops the cached catalog so the next access fetches again.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    async fn load(&self) -> AppResult<Arc<CachedOperators>> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            return Ok(cached.clone());
        }

        let schemas = self.source.list_operators().await?;
        let key_table = Arc::new(OperatorKeyTable::from_schemas(&schemas));
        debug!(operator_count = schemas.len(), "operator catalog loaded");

        let mut cached = self.cached.write().await;
        if let Some(existing) = cached.as_ref() {
            return Ok(existing.clone());
        }

        let loaded = Arc::new(CachedOperators { schemas, key_table });
        *cached = Some(loaded.clone());
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use reportdef_core::{AppError, AppResult};
    use reportdef_domain::{
        AggregateFunction, OperatorSchema, ParameterSource, ParameterTypeDecl, SchemaVariant,
    };

    use super::OperatorCatalog;
    use crate::report_ports::ReportCatalogSource;

    #[derive(Default)]
    struct CountingCatalogSource {
        calls: AtomicUsize,
        failures_remaining: AtomicUsize,
    }

    #[async_trait]
    impl ReportCatalogSource for CountingCatalogSource {
        async fn list_operators(&self) -> AppResult<Vec<OperatorSchema>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_remaining.load(Ordering::SeqCst) > 0 {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
                return Err(AppError::Internal("connection refused".to_owned()));
            }

            Ok(vec![OperatorSchema {
                name: "starts_with".to_owned(),
                display_name: "Starts with".to_owned(),
                schema: vec![SchemaVariant {
                    left: Some("value".to_owned()),
                    right: Some("prefix".to_owned()),
                }],
            }])
        }

        async fn list_aggregate_functions(&self) -> AppResult<Vec<AggregateFunction>> {
            Ok(Vec::new())
        }

        async fn list_parameter_types(
            &self,
            _source: ParameterSource,
        ) -> AppResult<Vec<ParameterTypeDecl>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn operators_are_fetched_once_per_session() {
        let source = Arc::new(CountingCatalogSource::default());
        let catalog = OperatorCatalog::new(source.clone());

        let operators = catalog.fetch_operators().await;
        assert!(matches!(operators, Ok(ref list) if list.len() == 1));
        let operator = catalog.operator_by_name("starts_with").await;
        assert!(operator.is_ok());
        assert!(catalog.key_table().await.is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        catalog.invalidate().await;
        assert!(catalog.fetch_operators().await.is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_propagates_and_is_not_cached() {
        let source = Arc::new(CountingCatalogSource::default());
        source.failures_remaining.store(1, Ordering::SeqCst);
        let catalog = OperatorCatalog::new(source.clone());

        assert!(matches!(
            catalog.fetch_operators().await,
            Err(AppError::Internal(_))
        ));
        assert!(catalog.fetch_operators().await.is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_operator_is_not_found() {
        let catalog = OperatorCatalog::new(Arc::new(CountingCatalogSource::default()));
        assert!(matches!(
            catalog.operator_by_name("matches").await,
            Err(AppError::NotFound(_))
        ));
    }
}
