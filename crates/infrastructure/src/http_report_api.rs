use async_trait::async_trait;
use reportdef_application::{
    FieldOptionsSource, PayloadFragment, ReportCatalogSource, ReportTemplateRepository,
};
use reportdef_core::{AppError, AppResult};
use reportdef_domain::{
    AggregateFunction, FieldOptions, OperatorSchema, ParameterSource, ParameterTypeDecl,
    ReportTemplate,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};


#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// reqwest adapter for the report field options, catalog and template resources.
pub struct HttpReportApi {
    http_client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpReportApi {
    /// Creates an adapter rooted at the report resource base URL.
    #[must_use]
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            access_token: None,
        }
    }

    /// Sends a bearer token with every request.
    #[must_use]
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/{resource}", self.base_url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        request: reqwest::RequestBuilder,
    ) -> AppResult<T> {
        let request = match &self.access_token {
            Some(access_token) => request.bearer_auth(access_token),
            None => request,
        };

        debug!(resource, "sending report API request");
        let response = request.send().await.map_err(|error| {
            AppError::Internal(format!("report API request '{resource}' failed: {error}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_owned());
            warn!(resource, %status, "report API returned an error status");
            return Err(AppError::Upstream(format!(
                "report API '{resource}' returned status {status}: {body}"
            )));
        }

        response.json::<T>().await.map_err(|error| {
            AppError::Upstream(format!(
                "report API '{resource}' returned an invalid body: {error}"
            ))
        })
    }
}

#[async_trait]
impl FieldOptionsSource for HttpReportApi {
    async fn field_options(&self, query: &PayloadFragment) -> AppResult<FieldOptions> {
        let envelope: DataEnvelope<FieldOptions> = self
            .send_json(
                "fieldoptions",
                self.http_client
                    .post(self.endpoint("fieldoptions"))
                    .json(query),
            )
            .await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl ReportCatalogSource for HttpReportApi {
    async fn list_operators(&self) -> AppResult<Vec<OperatorSchema>> {
        self.send_json("operators", self.http_client.get(self.endpoint("operators")))
            .await
    }

    async fn list_aggregate_functions(&self) -> AppResult<Vec<AggregateFunction>> {
        self.send_json("aggregates", self.http_client.get(self.endpoint("aggregates")))
            .await
    }

    async fn list_parameter_types(
        &self,
        source: ParameterSource,
    ) -> AppResult<Vec<ParameterTypeDecl>> {
        let resource = match source {
            ParameterSource::Basic => "parameters/types",
            ParameterSource::Datasource => "parameters/types?source=datasource",
        };

        let envelope: DataEnvelope<Vec<ParameterTypeDecl>> = self
            .send_json(resource, self.http_client.get(self.endpoint(resource)))
            .await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl ReportTemplateRepository for HttpReportApi {
    async fn create_draft_template(&self, template: ReportTemplate) -> AppResult<Value> {
        let resource = "templates?_action=create&templateType=draft";
        self.send_json(
            resource,
            self.http_client
                .post(self.endpoint(resource))
                .json(&template.to_request_body()),
        )
        .await
    }
}
