use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower::limit::GlobalConcurrencyLimitLayer;

use crate::config::Config;
use crate::data::{ProjectRequest, ProjectSchedule, ShiftAssignment, ShiftRequest, SolverOutcome};
use crate::error::SolveError;
use crate::interpret::{render_project_report, render_shift_report};
use crate::service::{budget_from_secs, solve_project_schedule, solve_shift_assignment};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveResponse<T> {
    #[serde(flatten)]
    outcome: SolverOutcome<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<String>,
}

fn status_code<T>(outcome: &SolverOutcome<T>) -> StatusCode {
    match outcome {
        SolverOutcome::Optimal { .. } | SolverOutcome::TimedOut { .. } => StatusCode::OK,
        SolverOutcome::Infeasible { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SolverOutcome::Error { error } => match error {
            SolveError::OverCapacity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SolveError::InvalidInstance { .. } => StatusCode::BAD_REQUEST,
            SolveError::SolverUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SolveError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

fn respond<T: Serialize>(outcome: SolverOutcome<T>, report: Option<String>) -> Response {
    let status = status_code(&outcome);
    (status, Json(SolveResponse { outcome, report })).into_response()
}

fn reject<T: Serialize>(error: SolveError) -> Response {
    respond::<T>(error.into(), None)
}

/// Runs a blocking solve off the async workers.
async fn run_blocking<T, F>(solve: F) -> (SolverOutcome<T>, Option<String>)
where
    T: Send + 'static,
    F: FnOnce() -> (SolverOutcome<T>, Option<String>) + Send + 'static,
{
    tokio::task::spawn_blocking(solve).await.unwrap_or_else(|e| {
        error!("Solve task failed: {e}");
        (SolveError::internal(format!("solve task failed: {e}")).into(), None)
    })
}

async fn solve_shifts(
    State(config): State<Arc<Config>>,
    body: Result<Json<ShiftRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return reject::<ShiftAssignment>(SolveError::invalid(rejection.body_text())),
    };
    let budget = match budget_from_secs(request.time_limit_secs) {
        Ok(budget) => budget,
        Err(e) => return reject::<ShiftAssignment>(e),
    };
    let instance = match request.into_instance(&config.limits) {
        Ok(instance) => instance,
        Err(e) => return reject::<ShiftAssignment>(e),
    };
    info!(
        "Shift request: {} agents, {} days, {} shifts",
        instance.agents, instance.days, instance.shifts
    );

    let (outcome, report) = run_blocking(move || {
        let outcome = solve_shift_assignment(&instance, budget, &config);
        let report = outcome.assignment().map(|assignment| {
            render_shift_report(assignment, &instance, outcome.runtime_seconds().unwrap_or(0.0))
        });
        (outcome, report)
    })
    .await;
    respond(outcome, report)
}

async fn solve_projects(
    State(config): State<Arc<Config>>,
    body: Result<Json<ProjectRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return reject::<ProjectSchedule>(SolveError::invalid(rejection.body_text())),
    };
    let config = match budget_from_secs(request.time_limit_secs) {
        Ok(None) => config,
        Ok(Some(budget)) => {
            let mut config = Config::clone(&config);
            config.solver.time_limit_secs = Some(budget.as_secs_f64());
            Arc::new(config)
        }
        Err(e) => return reject::<ProjectSchedule>(e),
    };
    let instance = request.into_instance();
    info!(
        "Project request: {} projects, {} tasks, {} teams",
        instance.projects.len(),
        instance.task_count(),
        instance.teams
    );

    let (outcome, report) = run_blocking(move || {
        let outcome = solve_project_schedule(&instance, &config);
        let report = outcome
            .assignment()
            .map(|schedule| render_project_report(schedule, &instance));
        (outcome, report)
    })
    .await;
    respond(outcome, report)
}

async fn health(State(config): State<Arc<Config>>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "backend": config.solver.backend }))
}

/// Solve routes share one concurrency limit; health checks bypass it.
pub fn router(config: Arc<Config>) -> Router {
    let max_solves = config.server.max_concurrent_solves;
    Router::new()
        .route("/v1/shifts/solve", post(solve_shifts))
        .route("/v1/projects/solve", post(solve_projects))
        .layer(GlobalConcurrencyLimitLayer::new(max_solves))
        .route("/v1/health", get(health))
        .with_state(config)
}

pub async fn run_server(config: Config) -> std::io::Result<()> {
    let bind = config.server.bind.clone();
    let app = router(Arc::new(config));

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}
