use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LogMealRequest {
    pub user_input: String,
    #[serde(default = "default_user")]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct LogMealResponse {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    #[serde(default = "default_user")]
    pub user_id: String,
}

fn default_user() -> String { "default".into() }
