use async_trait::async_trait;
use reportdef_core::AppResult;
use reportdef_domain::ReportTemplate;
use serde_json::Value;

/// Port for saved report templates.
#[async_trait]
pub trait ReportTemplateRepository: Send + Sync {
    /// Creates a draft template and returns the stored representation.
    async fn create_draft_template(&self, template: ReportTemplate) -> AppResult<Value>;
}
