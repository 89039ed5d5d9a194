use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, instrument, warn};

use super::dto::{LogMealRequest, LogMealResponse, PlanQuery};
use super::models::NutritionPlanModel;
use super::services::{current_plan, handle_user_input};
use crate::error::AssistantError;
use crate::state::AppState;

pub fn chat_routes() -> Router<AppState> {
    Router::new().route("/log-meal", post(log_meal))
}

pub fn plan_routes() -> Router<AppState> {
    Router::new().route("/plan", get(get_plan))
}

#[instrument(skip_all)]
pub async fn log_meal(
    State(state): State<AppState>,
    Json(body): Json<LogMealRequest>,
) -> Result<Json<LogMealResponse>, (StatusCode, String)> {
    let today = OffsetDateTime::now_utc().date();
    let response = handle_user_input(&state, &body.user_id, &body.user_input, today)
        .await
        .map_err(reject)?;
    Ok(Json(LogMealResponse { response }))
}

#[instrument(skip(state))]
pub async fn get_plan(
    State(state): State<AppState>,
    Query(q): Query<PlanQuery>,
) -> Result<Json<NutritionPlanModel>, (StatusCode, String)> {
    let today = OffsetDateTime::now_utc().date();
    let plan = current_plan(&state, &q.user_id, today).await.map_err(reject)?;
    Ok(Json(plan))
}

fn reject(e: AssistantError) -> (StatusCode, String) {
    let status = match &e {
        AssistantError::Validation(_) => StatusCode::BAD_REQUEST,
        AssistantError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        AssistantError::Backend(_)
        | AssistantError::MalformedResponse(_)
        | AssistantError::UnregisteredTool(_)
        | AssistantError::ToolArguments { .. } => StatusCode::BAD_GATEWAY,
        AssistantError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %e, %status, "request failed");
    } else {
        warn!(error = %e, %status, "request rejected");
    }
    (status, e.to_string())
}
