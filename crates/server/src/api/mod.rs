//! # HTTP API
//!
//! Routes under `/api/v1`. Handlers are documented with utoipa and the
//! collected document is served at `/api/v1/openapi.json`.

pub mod validation;

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use validator_core::sources::{source_description, SOURCE_NAMES};
use validator_core::state::{list_reports, load_report};
use validator_core::{ConfigPatch, ValidatorConfig};

use crate::SharedState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn error(code: StatusCode, message: impl std::fmt::Display) -> (StatusCode, Json<Self>) {
        (
            code,
            Json(Self {
                success: false,
                message: message.to_string(),
            }),
        )
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SourceInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    /// Effective configuration
    #[schema(value_type = Object)]
    pub config: ValidatorConfig,
    /// Built-in defaults
    #[schema(value_type = Object)]
    pub defaults: ValidatorConfig,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportListResponse {
    /// Saved report files, oldest first
    pub reports: Vec<String>,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Validator API",
        version = "1.0.0",
        description = "Multi-source product idea validation with resilient parallel research"
    ),
    paths(
        list_sources,
        list_saved_reports,
        get_report,
        get_config,
        update_config,
        validation::get_status,
        validation::start_validation,
        validation::resume_validation,
        validation::events,
    ),
    components(schemas(
        ApiResponse,
        SourceInfo,
        ConfigResponse,
        ReportListResponse,
        validation::RunStatus,
        validation::ValidationStatus,
        validation::StartValidationRequest,
        validation::ResumeValidationRequest,
    )),
    tags(
        (name = "validation", description = "Validation runs and their event feed"),
        (name = "sources", description = "Source catalog"),
        (name = "reports", description = "Saved validation reports"),
        (name = "config", description = "Configuration management")
    )
)]
pub struct ApiDoc;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .nest("/validation", validation::validation_routes())
        .route("/sources", get(list_sources))
        .route("/reports", get(list_saved_reports))
        .route("/reports/:name", get(get_report))
        .route("/config", get(get_config).patch(update_config))
        .route("/openapi.json", get(serve_openapi))
}

/// List the source catalog
#[utoipa::path(
    get,
    path = "/api/v1/sources",
    tag = "sources",
    responses(
        (status = 200, description = "Every selectable source", body = [SourceInfo])
    )
)]
async fn list_sources() -> Json<Vec<SourceInfo>> {
    let sources = SOURCE_NAMES
        .iter()
        .map(|name| SourceInfo {
            name: name.to_string(),
            description: source_description(name).unwrap_or_default().to_string(),
        })
        .collect();
    Json(sources)
}

/// List saved reports
#[utoipa::path(
    get,
    path = "/api/v1/reports",
    tag = "reports",
    responses(
        (status = 200, description = "Saved report files", body = ReportListResponse)
    )
)]
async fn list_saved_reports() -> Json<ReportListResponse> {
    let reports = list_reports().await.unwrap_or_else(|e| {
        tracing::warn!("Failed to list reports: {}", e);
        Vec::new()
    });
    Json(ReportListResponse { reports })
}

/// Get one saved report as markdown
#[utoipa::path(
    get,
    path = "/api/v1/reports/{name}",
    tag = "reports",
    params(("name" = String, Path, description = "Report file name")),
    responses(
        (status = 200, description = "Report markdown", content_type = "text/markdown", body = String),
        (status = 404, description = "No such report", body = ApiResponse)
    )
)]
async fn get_report(
    Path(name): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiResponse>)> {
    let report = load_report(&name)
        .await
        .map_err(|e| ApiResponse::error(StatusCode::NOT_FOUND, e))?;
    Ok(([(header::CONTENT_TYPE, "text/markdown; charset=utf-8")], report))
}

/// Get current configuration
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Current configuration and defaults", body = ConfigResponse),
        (status = 500, description = "Configuration could not be loaded", body = ApiResponse)
    )
)]
async fn get_config() -> Result<Json<ConfigResponse>, (StatusCode, Json<ApiResponse>)> {
    let config = ValidatorConfig::load()
        .await
        .map_err(|e| ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)))?;
    Ok(Json(ConfigResponse {
        config,
        defaults: ValidatorConfig::default(),
    }))
}

/// Update configuration (partial merge)
///
/// The body is a partial configuration; omitted fields keep their value.
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body(content = Object, description = "Partial configuration", content_type = "application/json"),
    responses(
        (status = 200, description = "Updated configuration", body = ConfigResponse),
        (status = 400, description = "Merged configuration is invalid", body = ApiResponse),
        (status = 500, description = "Configuration could not be saved", body = ApiResponse)
    )
)]
async fn update_config(
    Json(patch): Json<ConfigPatch>,
) -> Result<Json<ConfigResponse>, (StatusCode, Json<ApiResponse>)> {
    let mut config = ValidatorConfig::load()
        .await
        .map_err(|e| ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)))?;
    config.merge(patch);
    config
        .validate()
        .map_err(|e| ApiResponse::error(StatusCode::BAD_REQUEST, e))?;
    config
        .save()
        .await
        .map_err(|e| ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)))?;

    Ok(Json(ConfigResponse {
        config,
        defaults: ValidatorConfig::default(),
    }))
}

async fn serve_openapi() -> impl IntoResponse {
    let doc = ApiDoc::openapi().to_json().unwrap_or_default();
    ([(header::CONTENT_TYPE, "application/json")], doc)
}
