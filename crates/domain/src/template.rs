use reportdef_core::{AppResult, NonEmptyString};
use serde::Serialize;
use serde_json::{Value, json};

/// Report template persisted through the templates resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTemplate {
    name: NonEmptyString,
    description: String,
    viewers: Vec<String>,
    report_config: String,
}

impl ReportTemplate {
    /// Creates a template around a stringified report payload.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        viewers: Vec<String>,
        report_config: String,
    ) -> AppResult<Self> {
        Ok(Self {
            name: NonEmptyString::new(name)?,
            description: description.into(),
            viewers,
            report_config,
        })
    }

    /// Returns template name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the JSON-stringified report payload.
    #[must_use]
    pub fn report_config(&self) -> &str {
        self.report_config.as_str()
    }

    /// Returns the create request body.
    #[must_use]
    pub fn to_request_body(&self) -> Value {
        json!({ "reportTemplate": self })
    }
}
