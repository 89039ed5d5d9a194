use time::Date;
use tracing::{info, instrument};

use super::models::NutritionPlanModel;
use super::prompt::build_system_prompt;
use crate::error::{AssistantError, Result};
use crate::state::AppState;

/// Answers a chat message against the user's plan and today's log, logging a
/// meal along the way when the model decides to.
#[instrument(skip(state, user_input))]
pub async fn handle_user_input(
    state: &AppState,
    user_id: &str,
    user_input: &str,
    today: Date,
) -> Result<String> {
    if user_input.trim().is_empty() {
        return Err(AssistantError::Validation("user_input is empty".into()));
    }

    let plan = state.repo.get_plan(user_id, today).await?;
    let daily_log = state.repo.get_aggregated_log_for_day(user_id, today).await?;
    let prompt = build_system_prompt(&plan, &daily_log);

    let response = state.orchestrator.run(prompt, user_input).await?;
    info!(user_id, len = response.len(), "chat answered");
    Ok(response)
}

pub async fn current_plan(state: &AppState, user_id: &str, today: Date) -> Result<NutritionPlanModel> {
    Ok(state.repo.get_plan(user_id, today).await?)
}
