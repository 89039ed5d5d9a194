use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use time::{macros::format_description, OffsetDateTime};
use tracing::{debug, info, instrument};

use super::models::{Estimate, LogEntry};
use super::prompt::ESTIMATOR_SYSTEM_PROMPT;
use crate::error::{AssistantError, Result};
use crate::llm::{ChatBackend, ChatMessage, ChatRequest};

// --- strict reply schema ---

#[derive(Debug, Deserialize)]
struct MacroEstimate {
    estimate: f64,
    units: String,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct MicroEstimate {
    nutrient: String,
    estimate: f64,
    units: String,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct EstimateReply {
    calories: MacroEstimate,
    protein_g: MacroEstimate,
    fat_g: MacroEstimate,
    carbs_g: MacroEstimate,
    micronutrients: Vec<MicroEstimate>,
}

fn checked(nutrient: &str, estimate: f64, units: String, confidence: f64) -> Result<Estimate> {
    Estimate::new(nutrient, estimate, units, Some(confidence))
        .map_err(|e| AssistantError::MalformedResponse(e.to_string()))
}

impl MacroEstimate {
    fn into_estimate(self, nutrient: &str) -> Result<Estimate> {
        checked(nutrient, self.estimate, self.units, self.confidence)
    }
}

/// Turns free-text meal notes into a [`LogEntry`] with a schema-constrained model call.
pub struct MealEstimator {
    backend: Arc<dyn ChatBackend>,
    model: String,
}

impl MealEstimator {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    #[instrument(skip(self, notes, image_url))]
    pub async fn estimate(
        &self,
        meal_id: &str,
        notes: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<LogEntry> {
        let notes = notes.filter(|n| !n.trim().is_empty());
        let image_url = image_url.filter(|u| !u.trim().is_empty());

        if notes.is_none() && image_url.is_none() {
            return Err(AssistantError::Validation(
                "missing meal description: provide notes or an image url".into(),
            ));
        }
        if image_url.is_some() {
            return Err(AssistantError::NotImplemented(
                "image-based meal estimation".into(),
            ));
        }
        let notes = notes.unwrap_or_default();

        let request = ChatRequest::new(
            self.model.clone(),
            vec![
                ChatMessage::system(ESTIMATOR_SYSTEM_PROMPT),
                ChatMessage::user(notes),
            ],
        )
        .with_json_output();
        let reply = self.backend.complete(request).await?;

        let content = reply.content.ok_or_else(|| {
            AssistantError::MalformedResponse("estimator reply had no content".into())
        })?;
        debug!(len = content.len(), "estimator reply received");

        let parsed: EstimateReply = serde_json::from_str(&content)
            .map_err(|e| AssistantError::MalformedResponse(e.to_string()))?;

        let micronutrients = parsed
            .micronutrients
            .into_iter()
            .map(|m| checked(&m.nutrient, m.estimate, m.units, m.confidence))
            .collect::<Result<Vec<_>>>()?;

        let entry = LogEntry {
            meal_id: meal_id.to_string(),
            datetime: timestamp(OffsetDateTime::now_utc())?,
            calories: parsed.calories.into_estimate("calories")?,
            protein_g: parsed.protein_g.into_estimate("protein")?,
            fat_g: parsed.fat_g.into_estimate("fat")?,
            carbs_g: parsed.carbs_g.into_estimate("carbs")?,
            micronutrients: Some(micronutrients),
            notes: Some(notes.to_string()),
            image_url: None,
        };
        info!(meal_id, calories = %entry.calories, "meal estimated");
        Ok(entry)
    }
}

pub(crate) fn timestamp(at: OffsetDateTime) -> Result<String> {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    at.format(fmt)
        .context("format log timestamp")
        .map_err(AssistantError::from)
}
