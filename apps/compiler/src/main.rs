//! Report definition compiler CLI.

#![forbid(unsafe_code)]

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reportdef_application::{ReportDefinitionService, ReportSettings, ReportSettingsDocument};
use reportdef_core::{AppError, AppResult};
use reportdef_infrastructure::HttpReportApi;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "reportdef", about = "Compile report definitions into report queries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile report settings into the merged report query.
    Compile {
        /// Report settings document (JSON).
        definitions: PathBuf,
    },
    /// Decompose a saved report query into report settings.
    Decompile {
        /// Report query (JSON).
        payload: PathBuf,
    },
    /// Compile report settings and save them as a draft template.
    SaveDraft {
        /// Template name.
        #[arg(long)]
        name: String,
        /// Template description.
        #[arg(long, default_value = "")]
        description: String,
        /// Viewer role, repeatable.
        #[arg(long = "viewer")]
        viewers: Vec<String>,
        /// Report settings document (JSON).
        definitions: PathBuf,
    },
}

#[derive(Debug, Clone)]
struct CompilerConfig {
    api_base_url: String,
    access_token: Option<String>,
    timeout_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = CompilerConfig::load()?;
    let service = build_service(&config)?;

    info!(api_base_url = %config.api_base_url, "reportdef-compiler started");

    let output = match cli.command {
        Command::Compile { definitions } => {
            let settings = read_settings(&definitions).await?;
            Value::Object(service.report_payload(&settings).await?)
        }
        Command::Decompile { payload } => {
            let payload = read_json(&payload).await?;
            let settings = service.settings_from_payload(&payload).await?;
            serde_json::to_value(settings.to_document()).map_err(|error| {
                AppError::Internal(format!("failed to serialize report settings: {error}"))
            })?
        }
        Command::SaveDraft {
            name,
            description,
            viewers,
            definitions,
        } => {
            let settings = read_settings(&definitions).await?;
            let created = service
                .save_draft_template(&name, &description, viewers, &settings)
                .await?;
            info!(template = %name, "draft report template saved");
            created
        }
    };

    let rendered = serde_json::to_string_pretty(&output)
        .map_err(|error| AppError::Internal(format!("failed to render output: {error}")))?;
    println!("{rendered}");
    Ok(())
}

fn build_service(config: &CompilerConfig) -> AppResult<ReportDefinitionService> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let mut api = HttpReportApi::new(http_client, config.api_base_url.as_str());
    if let Some(access_token) = &config.access_token {
        api = api.with_access_token(access_token.as_str());
    }
    let api = Arc::new(api);

    Ok(ReportDefinitionService::new(api.clone(), api.clone()).with_template_repository(api))
}

async fn read_json(path: &Path) -> AppResult<Value> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|error| {
        AppError::NotFound(format!("failed to read '{}': {error}", path.display()))
    })?;

    serde_json::from_str(&contents).map_err(|error| {
        AppError::Validation(format!("'{}' is not valid JSON: {error}", path.display()))
    })
}

async fn read_settings(path: &Path) -> AppResult<ReportSettings> {
    let document: ReportSettingsDocument =
        serde_json::from_value(read_json(path).await?).map_err(|error| {
            AppError::Validation(format!(
                "'{}' is not a report settings document: {error}",
                path.display()
            ))
        })?;

    Ok(ReportSettings::from_document(document))
}

impl CompilerConfig {
    fn load() -> AppResult<Self> {
        let api_base_url = env::var("REPORT_API_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080/reports".to_owned())
            .trim_end_matches('/')
            .to_owned();
        url::Url::parse(&api_base_url).map_err(|error| {
            AppError::Validation(format!(
                "REPORT_API_BASE_URL is invalid '{api_base_url}': {error}"
            ))
        })?;

        let access_token = env::var("REPORT_API_ACCESS_TOKEN")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        let timeout_seconds = parse_env_u64("REPORT_API_TIMEOUT_SECONDS", 15)?;

        if timeout_seconds == 0 {
            return Err(AppError::Validation(
                "REPORT_API_TIMEOUT_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            api_base_url,
            access_token,
            timeout_seconds,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
