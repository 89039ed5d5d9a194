use async_trait::async_trait;
use time::{macros::format_description, Date};

use super::models::{DailyLog, Estimate, LogEntry, MicronutrientGoal, NutritionPlanModel, PlanStatus};

/// Read access to stored plans and logs.
#[async_trait]
pub trait NutritionRepo: Send + Sync {
    async fn get_plan(&self, user_id: &str, date: Date) -> anyhow::Result<NutritionPlanModel>;
    async fn get_aggregated_log_for_day(&self, user_id: &str, date: Date) -> anyhow::Result<DailyLog>;
}

pub fn date_string(date: Date) -> anyhow::Result<String> {
    Ok(date.format(format_description!("[year]-[month]-[day]"))?)
}

/// Fixed plan and log served until a database-backed store exists.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderRepo;

fn placeholder_estimate(nutrient: &str, estimate: f64) -> anyhow::Result<Estimate> {
    Ok(Estimate::new(nutrient, estimate, "grams", Some(0.5))?)
}

#[async_trait]
impl NutritionRepo for PlaceholderRepo {
    async fn get_plan(&self, user_id: &str, date: Date) -> anyhow::Result<NutritionPlanModel> {
        tracing::debug!(user_id, %date, "serving placeholder plan");
        let day = date_string(date)?;
        Ok(NutritionPlanModel {
            start_date: day.clone(),
            end_date: day,
            status: PlanStatus::Active,
            calories: 100,
            protein_g: 100,
            fat_g: 100,
            carbs_g: 30,
            micronutrient_goals: vec![
                MicronutrientGoal {
                    nutrient: "vitamin a".into(),
                    goal: 900.0,
                    units: "mcg".into(),
                },
                MicronutrientGoal {
                    nutrient: "vitamin b12".into(),
                    goal: 3.0,
                    units: "mcg".into(),
                },
            ],
        })
    }

    async fn get_aggregated_log_for_day(&self, user_id: &str, date: Date) -> anyhow::Result<DailyLog> {
        tracing::debug!(user_id, %date, "serving placeholder daily log");
        let day = date_string(date)?;
        let breakfast = LogEntry {
            meal_id: "breakfast".into(),
            datetime: format!("{day} 08:00:00"),
            calories: placeholder_estimate("calories", 100.0)?,
            protein_g: placeholder_estimate("protein", 50.0)?,
            fat_g: placeholder_estimate("fat", 100.0)?,
            carbs_g: placeholder_estimate("carbs", 100.0)?,
            micronutrients: None,
            notes: None,
            image_url: None,
        };
        Ok(DailyLog::new(day, vec![breakfast]))
    }
}
