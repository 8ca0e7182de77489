//! # Validation API
//!
//! Start, observe, and resume validation runs.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use utoipa::ToSchema;

use validator_core::sources::{confirmation_key, ResearchPlan};
use validator_core::swarm::{Coordinator, Event, ValidationResult};
use validator_core::ValidatorConfig;

use super::ApiResponse;
use crate::SharedState;

/// Heartbeat interval of the SSE feed
const HEARTBEAT: Duration = Duration::from_secs(15);

/// Lifecycle of the current validation
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    /// Waiting for the user to confirm a source
    Paused,
    Complete,
    Error,
}

/// Where the current validation stands
#[derive(Debug, Default, Clone, Serialize, ToSchema)]
pub struct ValidationStatus {
    pub status: RunStatus,
    pub invocation_id: Option<String>,
    pub product_idea: Option<String>,
    /// Events delivered so far
    pub events: usize,
    pub reported_sources: Vec<String>,
    pub missing_sources: Vec<String>,
    /// Source waiting for confirmation, when paused
    pub awaiting_input: Option<String>,
    pub report_path: Option<String>,
    pub error: Option<String>,
}

pub fn initial_status() -> ValidationStatus {
    ValidationStatus::default()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartValidationRequest {
    pub product_idea: String,
    /// Sources to query; all when omitted
    pub sources: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub focus: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResumeValidationRequest {
    /// Sources whose findings the user confirmed
    #[serde(default)]
    pub confirm: Vec<String>,
}

pub fn validation_routes() -> Router<SharedState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/start", post(start_validation))
        .route("/resume", post(resume_validation))
        .route("/events", get(events))
}

/// Get validation status
#[utoipa::path(
    get,
    path = "/api/v1/validation/status",
    tag = "validation",
    responses(
        (status = 200, description = "Current validation status", body = ValidationStatus)
    )
)]
pub async fn get_status(State(state): State<SharedState>) -> Json<ValidationStatus> {
    let status = state.status.read().await;
    Json(status.clone())
}

/// Start validating a product idea
#[utoipa::path(
    post,
    path = "/api/v1/validation/start",
    tag = "validation",
    request_body = StartValidationRequest,
    responses(
        (status = 200, description = "Validation started", body = ApiResponse),
        (status = 409, description = "A validation is already running", body = ApiResponse),
        (status = 500, description = "Configuration could not be loaded", body = ApiResponse)
    )
)]
pub async fn start_validation(
    State(state): State<SharedState>,
    Json(req): Json<StartValidationRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let config = match ValidatorConfig::load().await {
        Ok(config) => config,
        Err(e) => return ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e),
    };

    let mut plan = ResearchPlan::new(req.product_idea.clone());
    if let Some(sources) = req.sources {
        plan = plan.with_sources(sources);
    }
    if let Some(keywords) = req.keywords {
        plan = plan.with_keywords(keywords);
    }
    if let Some(focus) = req.focus {
        plan = plan.with_focus(focus);
    }

    if !claim(&state, Some(req.product_idea.clone())).await {
        return ApiResponse::error(StatusCode::CONFLICT, "A validation is already running");
    }
    *state.paused.write().await = None;

    tracing::info!(idea = %req.product_idea, "Starting validation");
    spawn_run(state, config, Run::Fresh(plan));

    (
        StatusCode::OK,
        Json(ApiResponse::ok(format!(
            "Validation started for: {}",
            req.product_idea
        ))),
    )
}

/// Confirm sources and continue a paused validation
#[utoipa::path(
    post,
    path = "/api/v1/validation/resume",
    tag = "validation",
    request_body = ResumeValidationRequest,
    responses(
        (status = 200, description = "Validation resumed", body = ApiResponse),
        (status = 409, description = "No paused validation", body = ApiResponse),
        (status = 500, description = "Configuration could not be loaded", body = ApiResponse)
    )
)]
pub async fn resume_validation(
    State(state): State<SharedState>,
    Json(req): Json<ResumeValidationRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let config = match ValidatorConfig::load().await {
        Ok(config) => config,
        Err(e) => return ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e),
    };

    let Some(mut ctx) = state.paused.write().await.take() else {
        return ApiResponse::error(StatusCode::CONFLICT, "No paused validation");
    };
    for source in &req.confirm {
        ctx.state
            .insert(confirmation_key(source), serde_json::Value::Bool(true));
    }

    if !claim(&state, None).await {
        *state.paused.write().await = Some(ctx);
        return ApiResponse::error(StatusCode::CONFLICT, "A validation is already running");
    }

    tracing::info!(
        invocation_id = %ctx.invocation_id,
        confirmed = req.confirm.len(),
        "Resuming validation"
    );
    spawn_run(state, config, Run::Resume(ctx));

    (StatusCode::OK, Json(ApiResponse::ok("Validation resumed")))
}

/// Mark the status running unless a run is already in flight
async fn claim(state: &SharedState, product_idea: Option<String>) -> bool {
    let mut status = state.status.write().await;
    if status.status == RunStatus::Running {
        return false;
    }
    let product_idea = product_idea.or_else(|| status.product_idea.clone());
    *status = ValidationStatus {
        status: RunStatus::Running,
        product_idea,
        ..ValidationStatus::default()
    };
    true
}

enum Run {
    Fresh(ResearchPlan),
    Resume(validator_core::swarm::InvocationContext),
}

/// Run the coordinator in the background, bridging its events to the broadcast
fn spawn_run(state: SharedState, config: ValidatorConfig, run: Run) {
    let (event_tx, mut event_rx) = mpsc::channel::<Event>(100);

    let bridge_state = state.clone();
    let bridge = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            bridge_state.status.write().await.events += 1;
            let _ = bridge_state.event_tx.send(event);
        }
    });

    tokio::spawn(async move {
        let mut coordinator = Coordinator::new(config).with_event_channel(event_tx);
        let outcome = match run {
            Run::Fresh(plan) => coordinator.run(plan).await,
            Run::Resume(ctx) => coordinator.resume(ctx).await,
        };
        // Closes the channel; wait until every event has been forwarded
        drop(coordinator);
        if let Err(e) = bridge.await {
            tracing::warn!("Event bridge ended abnormally: {}", e);
        }

        match outcome {
            Ok(result) => finish(&state, result).await,
            Err(e) => {
                tracing::error!("Validation failed: {:#}", e);
                let mut status = state.status.write().await;
                status.status = RunStatus::Error;
                status.error = Some(format!("{:#}", e));
            }
        }
    });
}

async fn finish(state: &SharedState, result: ValidationResult) {
    let awaiting_input = if result.paused {
        result.events.last().map(|e| e.author.clone())
    } else {
        None
    };

    {
        let mut status = state.status.write().await;
        status.status = if result.paused {
            RunStatus::Paused
        } else {
            RunStatus::Complete
        };
        status.invocation_id = Some(result.invocation_id.clone());
        status.reported_sources = result.reported_sources.clone();
        status.missing_sources = result.missing_sources.clone();
        status.awaiting_input = awaiting_input;
        status.report_path = result
            .report_path
            .as_ref()
            .map(|p| p.display().to_string());
    }

    if result.paused {
        *state.paused.write().await = Some(result.context);
    }
}

/// SSE feed of validation events with heartbeat
#[utoipa::path(
    get,
    path = "/api/v1/validation/events",
    tag = "validation",
    responses(
        (status = 200, description = "Server-sent stream of validation events")
    )
)]
pub async fn events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.event_tx.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match tokio::time::timeout(HEARTBEAT, rx.recv()).await {
                Ok(Ok(event)) => {
                    let json = serde_json::to_string(&event).unwrap_or_default();
                    let sse = SseEvent::default()
                        .event(kind_name(&event))
                        .data(json);
                    return Some((Ok(sse), rx));
                }
                Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "SSE subscriber lagged; events dropped");
                    continue;
                }
                Ok(Err(_)) => return None,
                Err(_) => return Some((Ok(SseEvent::default().comment("heartbeat")), rx)),
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn kind_name(event: &Event) -> String {
    serde_json::to_value(event.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "event".to_string())
}
