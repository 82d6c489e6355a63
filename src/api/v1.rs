use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    balance::Reconciliation,
    domain::{BalanceInput, Hypothesis},
    search::{CandidateSet, SearchSettings},
    service::BalanceService,
};

pub fn router(service: BalanceService) -> Router {
    Router::new()
        .route("/balance", post(reconcile))
        .route("/balance/gt", post(global_test))
        .route("/balance/glr", post(glr))
        .route("/balance/glrbest", post(glr_best))
        .route("/healthz", get(healthz))
        .with_state(service)
}

pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

/// Search limits for `POST /balance/glr`; absent values use the configured ones
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GlrQuery {
    #[validate(range(min = 1, max = 10))]
    pub max_branching: Option<usize>,
    #[validate(range(min = 1, max = 20))]
    pub max_depth: Option<usize>,
    pub candidates: Option<CandidateSet>,
}

impl GlrQuery {
    fn settings(&self, defaults: SearchSettings) -> SearchSettings {
        SearchSettings {
            max_branching: self.max_branching.unwrap_or(defaults.max_branching),
            max_depth: self.max_depth.unwrap_or(defaults.max_depth),
            candidates: self.candidates.unwrap_or(defaults.candidates),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// POST /api/v1/balance - Reconcile measurements
pub async fn reconcile(
    State(service): State<BalanceService>,
    Json(input): Json<BalanceInput>,
) -> Result<ApiResponse<Reconciliation>, ApiError> {
    let started = Instant::now();
    let result = service.reconcile(input).await?;
    Ok(ApiResponse::success(result)
        .with_solver(service.solver_name())
        .with_duration(elapsed_ms(started)))
}

/// POST /api/v1/balance/gt - Global Test value
pub async fn global_test(
    State(service): State<BalanceService>,
    Json(input): Json<BalanceInput>,
) -> Result<ApiResponse<f64>, ApiError> {
    let started = Instant::now();
    let value = service.global_test(input).await?;
    Ok(ApiResponse::success(value).with_duration(elapsed_ms(started)))
}

/// POST /api/v1/balance/glr - Ranked gross-error hypotheses
pub async fn glr(
    State(service): State<BalanceService>,
    Query(query): Query<GlrQuery>,
    Json(input): Json<BalanceInput>,
) -> Result<ApiResponse<Vec<Hypothesis>>, ApiError> {
    query.validate()?;
    let started = Instant::now();
    let settings = query.settings(service.search_settings());
    let ranked = service.glr(input, Some(settings)).await?;
    let count = ranked.len();
    Ok(ApiResponse::success(ranked)
        .with_count(count)
        .with_duration(elapsed_ms(started)))
}

/// POST /api/v1/balance/glrbest - Best single chain of hypotheses
pub async fn glr_best(
    State(service): State<BalanceService>,
    Json(input): Json<BalanceInput>,
) -> Result<ApiResponse<Vec<Hypothesis>>, ApiError> {
    let started = Instant::now();
    let ranked = service.glr_best(input).await?;
    let count = ranked.len();
    Ok(ApiResponse::success(ranked)
        .with_count(count)
        .with_duration(elapsed_ms(started)))
}
